//! The command dispatch pipeline.
//!
//! ```text
//! Idle ─▶ PrefixResolved ─▶ Tokenized ─▶ Resolved ─▶ Invoked ─┬▶ Completed
//!                                                             ├▶ Rejected
//!                                                             └▶ Errored
//! ```
//!
//! Any step that finds nothing to do ends the dispatch as
//! [`DispatchOutcome::NoMatch`]; ordinary chat is not an error.  A command's
//! error stops here: it is logged, rendered to the user, and returned as an
//! outcome, never propagated.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info_span, warn};

use guildkit_core::{Embed, GuildId, MessageEvent};

use crate::args::Args;
use crate::context::{BotCore, CommandContext};
use crate::error::CommandError;

/// Terminal state of one command dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Not a command: no prefix, nothing after it, or an unknown name.
    NoMatch,
    /// The command ran and returned `Ok`.
    Completed { command: String },
    /// The command was refused before invocation.
    Rejected { command: String },
    /// The command ran and returned an error, already reported to the user.
    Errored { command: String, error: CommandError },
}

impl DispatchOutcome {
    /// Name of the command that was resolved, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::NoMatch => None,
            Self::Completed { command }
            | Self::Rejected { command }
            | Self::Errored { command, .. } => Some(command),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Runs the pipeline for one inbound message.
pub async fn dispatch_command(core: &Arc<BotCore>, event: Arc<MessageEvent>) -> DispatchOutcome {
    if event.author_id == core.self_id() || event.author_is_bot {
        return DispatchOutcome::NoMatch;
    }

    // PrefixResolved
    let prefix = match event.guild_id {
        None => String::new(),
        Some(guild) => resolve_guild_prefix(core, guild),
    };

    // Tokenized
    let Some((name, args)) = tokenize(&event.content, &prefix) else {
        return DispatchOutcome::NoMatch;
    };

    // Resolved.  The snapshot stays alive until the command finishes, which
    // keeps the command's module mapped.
    let tables = core.registry().snapshot();
    let Some(entry) = tables.command(&name) else {
        debug!(name = %name, "Unknown command");
        return DispatchOutcome::NoMatch;
    };
    let command = entry.descriptor.name.clone();

    // Invoked
    if entry.descriptor.guild_only && event.is_direct() {
        debug!(command = %command, author = %event.author_id, "Guild-only command used in a direct message");
        let notice = Embed::new(format!("`{command}` is unavailable here"))
            .description("This command only works in a server.")
            .color(Embed::ERROR_COLOR);
        if let Err(e) = core.messenger().send_embed(event.channel_id, &notice).await {
            warn!(command = %command, error = %e, "Failed to send rejection notice");
        }
        return DispatchOutcome::Rejected { command };
    }

    let ctx = CommandContext {
        core: Arc::clone(core),
        event: Arc::clone(&event),
        command: command.clone(),
        invoked_as: name,
        args,
    };

    let span = info_span!(
        "command",
        command = %command,
        extension = %entry.extension,
        guild = ?event.guild_id.map(GuildId::get),
        author = %event.author_id,
    );
    let result = (entry.descriptor.handler)(ctx).instrument(span).await;
    drop(tables);

    match result {
        Ok(()) => DispatchOutcome::Completed { command },
        Err(error) => {
            if error.is_fault() {
                error!(command = %command, error = %error, "Command failed");
            } else {
                debug!(command = %command, error = %error, "Command refused input");
            }
            let notice = Embed::new(format!("`{command}` failed"))
                .description(error.to_string())
                .color(Embed::ERROR_COLOR);
            if let Err(e) = core.messenger().send_embed(event.channel_id, &notice).await {
                warn!(command = %command, error = %e, "Failed to send failure notice");
            }
            DispatchOutcome::Errored { command, error }
        }
    }
}

/// Cached prefix for `guild`.  A miss is a consistency fault: the record is
/// repaired through the store, which republishes its prefix to the cache.
fn resolve_guild_prefix(core: &BotCore, guild: GuildId) -> String {
    let store = core.store();
    if let Some(prefix) = store.cached_prefix(guild) {
        return prefix;
    }

    if store.contains(guild) {
        warn!(guild = %guild, "Prefix cache miss for a known guild, repairing");
    } else {
        debug!(guild = %guild, "First message from guild, creating record");
    }
    store.with_guild(guild, "prefix-repair", |record| record.prefix.clone())
}

/// Strips `prefix` and splits the rest into a case-folded name and
/// arguments.  `None` when the text is not a command.
fn tokenize(content: &str, prefix: &str) -> Option<(String, Args)> {
    let body = content.strip_prefix(prefix)?;
    if body.is_empty() {
        return None;
    }
    let mut tokens = body.split_whitespace();
    let name = tokens.next()?.to_lowercase();
    let args = Args::new(tokens.map(str::to_string).collect());
    Some((name, args))
}

#[cfg(test)]
mod tests {
    use guildkit_core::testing::RecordingMessenger;
    use guildkit_core::{ChannelId, MessageId, UserId};

    use super::*;
    use crate::context::InitContext;
    use crate::error::BoxError;
    use crate::extension::{CatalogLoader, CommandDescriptor, ExtensionDescriptor};
    use crate::store::GuildStore;

    const BOT: UserId = UserId(999);

    fn echo(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("echo", "1.0.0")
            .command(
                CommandDescriptor::new("echo", |ctx: CommandContext| async move {
                    let text = ctx.args.rest_from(1).unwrap_or_default();
                    ctx.reply(&format!("{}:{}", ctx.invoked_as, text)).await?;
                    Ok(())
                })
                .alias("Say"),
            )
            .command(
                CommandDescriptor::new("count", |ctx: CommandContext| async move {
                    let n: u32 = ctx.args.parse(1, "a number")?;
                    ctx.reply(&n.to_string()).await?;
                    Ok(())
                }),
            )
            .command(
                CommandDescriptor::new("setup", |ctx: CommandContext| async move {
                    ctx.reply("configured").await?;
                    Ok(())
                })
                .guild_only(),
            )
            .command(CommandDescriptor::new("explode", |_| async {
                Err(CommandError::failed("disk on fire"))
            })))
    }

    async fn core() -> (Arc<BotCore>, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new(BOT));
        let core = BotCore::builder(GuildStore::new("."), messenger.clone())
            .loader(Arc::new(CatalogLoader::new()))
            .build();
        assert!(core.register_builtin(echo).await.is_clean());
        (core, messenger)
    }

    fn message(guild: Option<u64>, author: UserId, content: &str) -> Arc<MessageEvent> {
        Arc::new(MessageEvent {
            id: MessageId(1),
            guild_id: guild.map(GuildId),
            channel_id: ChannelId(10),
            author_id: author,
            author_is_bot: false,
            content: content.into(),
        })
    }

    #[test]
    fn test_tokenize() {
        let (name, args) = tokenize(".Echo  hi  there", ".").unwrap();
        assert_eq!(name, "echo");
        assert_eq!(args.optional(1), Some("hi"));
        assert_eq!(args.optional(2), Some("there"));

        assert!(tokenize(".", ".").is_none());
        assert!(tokenize(".   ", ".").is_none());
        assert!(tokenize("hello", ".").is_none());
        assert_eq!(tokenize("ping", "").unwrap().0, "ping");
        assert!(tokenize("", "").is_none());
    }

    #[tokio::test]
    async fn test_case_insensitive_name_and_alias() {
        let (core, messenger) = core().await;

        let outcome = dispatch_command(&core, message(Some(1), UserId(5), ".ECHO a b")).await;
        assert!(outcome.is_completed());
        let outcome = dispatch_command(&core, message(Some(1), UserId(5), ".sAy c")).await;
        assert_eq!(outcome.command(), Some("echo"));

        assert_eq!(messenger.texts(), vec!["echo:a b", "say:c"]);
    }

    #[tokio::test]
    async fn test_direct_messages_use_empty_prefix() {
        let (core, messenger) = core().await;
        let outcome = dispatch_command(&core, message(None, UserId(5), "echo hi")).await;
        assert!(outcome.is_completed());
        assert_eq!(messenger.texts(), vec!["echo:hi"]);
        // A direct message never creates a guild record.
        assert!(core.store().is_empty());
    }

    #[tokio::test]
    async fn test_non_commands_are_no_match() {
        let (core, messenger) = core().await;
        for content in ["hello there", ".", ".nonexistent", "!echo wrong prefix"] {
            let outcome = dispatch_command(&core, message(Some(1), UserId(5), content)).await;
            assert!(matches!(outcome, DispatchOutcome::NoMatch), "{content}");
        }
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_own_messages_are_ignored() {
        let (core, messenger) = core().await;
        let outcome = dispatch_command(&core, message(Some(1), BOT, ".echo loop")).await;
        assert!(matches!(outcome, DispatchOutcome::NoMatch));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_guild_only_rejected_in_direct_message() {
        let (core, messenger) = core().await;
        let outcome = dispatch_command(&core, message(None, UserId(5), "setup")).await;

        assert!(matches!(outcome, DispatchOutcome::Rejected { ref command } if command == "setup"));
        assert!(messenger.texts().is_empty());
        assert_eq!(messenger.embeds()[0].title, "`setup` is unavailable here");
    }

    #[tokio::test]
    async fn test_errors_are_rendered_not_propagated() {
        let (core, messenger) = core().await;

        let outcome = dispatch_command(&core, message(Some(1), UserId(5), ".count lots")).await;
        let DispatchOutcome::Errored { command, error } = outcome else {
            panic!("expected an error outcome");
        };
        assert_eq!(command, "count");
        assert!(matches!(error, CommandError::Syntax(_)));

        let outcome = dispatch_command(&core, message(Some(1), UserId(5), ".explode")).await;
        assert!(matches!(outcome, DispatchOutcome::Errored { ref error, .. } if error.is_fault()));

        let embeds = messenger.embeds();
        assert_eq!(embeds.len(), 2);
        assert_eq!(embeds[0].title, "`count` failed");
        assert_eq!(embeds[0].description, "argument 1: `lots` is not a number");
        assert_eq!(embeds[1].title, "`explode` failed");
        assert_eq!(embeds[1].description, "disk on fire");
    }

    #[tokio::test]
    async fn test_messenger_failure_is_an_external_error() {
        let (core, messenger) = core().await;
        messenger.fail_sends(true);
        let outcome = dispatch_command(&core, message(Some(1), UserId(5), ".echo hi")).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Errored { error: CommandError::External(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_prefix_cache_miss_is_repaired() {
        let (core, messenger) = core().await;
        core.store()
            .with_guild(GuildId(7), "set-prefix", |r| r.prefix = "!".into());
        core.store().forget_cached_prefix(GuildId(7));

        let outcome = dispatch_command(&core, message(Some(7), UserId(5), "!echo back")).await;

        assert!(outcome.is_completed());
        assert_eq!(core.store().cached_prefix(GuildId(7)).as_deref(), Some("!"));
        assert_eq!(messenger.texts(), vec!["echo:back"]);
    }

    #[tokio::test]
    async fn test_first_message_creates_record_with_default_prefix() {
        let (core, _) = core().await;
        let outcome = dispatch_command(&core, message(Some(8), UserId(5), "just chatting")).await;

        assert!(matches!(outcome, DispatchOutcome::NoMatch));
        assert!(core.store().contains(GuildId(8)));
        assert_eq!(core.store().cached_prefix(GuildId(8)).as_deref(), Some("."));
    }
}
