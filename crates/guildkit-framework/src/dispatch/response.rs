//! The auto-response engine.
//!
//! Every registered response is evaluated against each message.  Matching
//! responses run as separate tasks, so one slow or panicking response never
//! holds up or cancels its siblings.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{Instrument, debug, error, info_span};

use guildkit_core::MessageEvent;

use crate::context::{BotCore, ResponseContext};

/// Fires every response whose patterns and allow-lists accept `event`.
/// Returns how many fired.
pub async fn run_responses(core: &Arc<BotCore>, event: Arc<MessageEvent>) -> usize {
    let self_id = core.self_id();
    if event.author_id == self_id {
        return 0;
    }

    let tables = core.registry().snapshot();
    let matched: Vec<_> = tables
        .responses()
        .iter()
        .filter(|entry| entry.should_fire(&event, self_id))
        .cloned()
        .collect();
    drop(tables);

    if matched.is_empty() {
        return 0;
    }

    let tasks = matched.iter().map(|entry| {
        let ctx = ResponseContext {
            core: Arc::clone(core),
            event: Arc::clone(&event),
            extension: Arc::clone(&entry.extension),
            response: entry.descriptor.name.clone(),
        };
        let span = info_span!(
            "response",
            extension = %entry.extension,
            response = %entry.descriptor.name,
        );
        let entry = Arc::clone(entry);
        tokio::spawn(
            async move {
                (entry.descriptor.handler)(ctx).await;
                // Keeps the owning module mapped until the handler is done.
                drop(entry);
            }
            .instrument(span),
        )
    });
    let results = join_all(tasks.collect::<Vec<_>>()).await;

    for (entry, result) in matched.iter().zip(results) {
        if let Err(e) = result {
            error!(
                extension = %entry.extension,
                response = %entry.descriptor.name,
                error = %e,
                "Response handler panicked"
            );
        }
    }

    debug!(fired = matched.len(), "Responses dispatched");
    matched.len()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use guildkit_core::testing::RecordingMessenger;
    use guildkit_core::{ChannelId, GuildId, MessageId, UserId};

    use super::*;
    use crate::context::InitContext;
    use crate::error::BoxError;
    use crate::extension::{CatalogLoader, ExtensionDescriptor, ResponseDescriptor};
    use crate::store::GuildStore;

    const BOT: UserId = UserId(999);

    fn responses(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("responses", "1.0.0")
            .response(
                ResponseDescriptor::new("two-of-three", ["a", "b", "c"], |ctx: ResponseContext| async move {
                    let _ = ctx.reply("two-of-three").await;
                })
                .match_min(2),
            )
            .response(ResponseDescriptor::new("x", ["x"], |ctx: ResponseContext| async move {
                let _ = ctx.reply("x").await;
            }))
            .response(
                ResponseDescriptor::new("zero", ["never-matches-zzz"], |ctx: ResponseContext| async move {
                    let _ = ctx.reply("zero").await;
                })
                .match_min(0)
                .channels([ChannelId(77)]),
            )
            .response(
                ResponseDescriptor::new("negative", ["never-matches-zzz"], |ctx: ResponseContext| async move {
                    let _ = ctx.reply("negative").await;
                })
                .match_min(-1)
                .channels([ChannelId(78)]),
            ))
    }

    static SLOW_DONE: AtomicUsize = AtomicUsize::new(0);

    fn isolated(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("isolated", "1.0.0")
            .response(ResponseDescriptor::new("panics", ["go"], |_| async {
                panic!("response bug");
            }))
            .response(ResponseDescriptor::new("slow", ["go"], |_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                SLOW_DONE.fetch_add(1, Ordering::SeqCst);
            }))
            .response(ResponseDescriptor::new("fast", ["go"], |ctx: ResponseContext| async move {
                let _ = ctx.reply("fast").await;
            })))
    }

    async fn core(init: crate::extension::InitFn) -> (Arc<BotCore>, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new(BOT));
        let core = BotCore::builder(GuildStore::new("."), messenger.clone())
            .loader(Arc::new(CatalogLoader::new()))
            .build();
        assert!(core.register_builtin(init).await.is_clean());
        (core, messenger)
    }

    fn message(channel: u64, author: UserId, content: &str) -> Arc<MessageEvent> {
        Arc::new(MessageEvent {
            id: MessageId(1),
            guild_id: Some(GuildId(1)),
            channel_id: ChannelId(channel),
            author_id: author,
            author_is_bot: false,
            content: content.into(),
        })
    }

    async fn fired(core: &Arc<BotCore>, messenger: &RecordingMessenger, channel: u64, content: &str) -> Vec<String> {
        messenger.clear();
        run_responses(core, message(channel, UserId(5), content)).await;
        let mut texts = messenger.texts();
        texts.sort();
        texts
    }

    #[tokio::test]
    async fn test_match_min_two_of_three() {
        let (core, messenger) = core(responses).await;
        assert_eq!(fired(&core, &messenger, 1, "a and b").await, vec!["two-of-three"]);
        assert_eq!(fired(&core, &messenger, 1, "c then a").await, vec!["two-of-three"]);
        assert!(fired(&core, &messenger, 1, "only a").await.is_empty());
    }

    #[tokio::test]
    async fn test_single_pattern_fires_on_substring() {
        let (core, messenger) = core(responses).await;
        assert_eq!(fired(&core, &messenger, 1, "xylophone").await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_zero_and_negative_match_min_always_fire() {
        let (core, messenger) = core(responses).await;
        // Neither pattern matches; the threshold is met regardless.
        assert_eq!(fired(&core, &messenger, 77, "nothing").await, vec!["zero"]);
        assert_eq!(fired(&core, &messenger, 78, "nothing").await, vec!["negative"]);
    }

    #[tokio::test]
    async fn test_channel_allow_list() {
        let (core, messenger) = core(responses).await;
        // Outside the allow-list, even an always-satisfied response is skipped.
        assert!(fired(&core, &messenger, 1, "nothing").await.is_empty());
    }

    #[tokio::test]
    async fn test_own_messages_never_match() {
        let (core, messenger) = core(responses).await;
        let count = run_responses(&core, message(77, BOT, "x a b")).await;
        assert_eq!(count, 0);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_do_not_affect_siblings() {
        let (core, messenger) = core(isolated).await;
        let count = run_responses(&core, message(1, UserId(5), "go")).await;

        assert_eq!(count, 3);
        assert_eq!(messenger.texts(), vec!["fast"]);
        assert_eq!(SLOW_DONE.load(Ordering::SeqCst), 1);
    }
}
