//! In-memory [`Messenger`] for tests.
//!
//! Enabled with the `testing` feature.  Every outbound call is recorded in
//! order; [`RecordingMessenger::fail_sends`] makes send calls return
//! [`ApiError::NotConnected`] to exercise failure paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ApiError, ApiResult};
use crate::id::{ChannelId, MessageId, UserId};
use crate::messenger::{Embed, MessageHandle, Messenger};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { channel: ChannelId, text: String },
    Embed { channel: ChannelId, embed: Embed },
    Edit { message: MessageHandle, text: String },
    Reaction { message: MessageHandle, emoji: String },
}

/// Records every outbound call instead of talking to a gateway.
#[derive(Debug)]
pub struct RecordingMessenger {
    self_id: UserId,
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes subsequent send calls fail (or succeed again).
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every recorded call, oldest first.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    /// Texts of recorded plain messages.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded embeds.
    pub fn embeds(&self) -> Vec<Embed> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Embed { embed, .. } => Some(embed.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, channel: ChannelId, entry: Sent) -> ApiResult<MessageHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::NotConnected);
        }
        self.sent.lock().push(entry);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageHandle::new(channel, MessageId(id)))
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn self_id(&self) -> UserId {
        self.self_id
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> ApiResult<MessageHandle> {
        self.record(
            channel,
            Sent::Text {
                channel,
                text: text.to_string(),
            },
        )
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> ApiResult<MessageHandle> {
        self.record(
            channel,
            Sent::Embed {
                channel,
                embed: embed.clone(),
            },
        )
    }

    async fn edit_message(&self, message: MessageHandle, text: &str) -> ApiResult<()> {
        self.record(
            message.channel_id,
            Sent::Edit {
                message,
                text: text.to_string(),
            },
        )
        .map(|_| ())
    }

    async fn react(&self, message: MessageHandle, emoji: &str) -> ApiResult<()> {
        self.record(
            message.channel_id,
            Sent::Reaction {
                message,
                emoji: emoji.to_string(),
            },
        )
        .map(|_| ())
    }

    async fn list_reactors(&self, _message: MessageHandle, _emoji: &str) -> ApiResult<Vec<UserId>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let messenger = RecordingMessenger::new(UserId(1));
        messenger.send_message(ChannelId(5), "one").await.unwrap();
        messenger
            .send_embed(ChannelId(5), &Embed::new("two"))
            .await
            .unwrap();

        assert_eq!(messenger.texts(), vec!["one".to_string()]);
        assert_eq!(messenger.embeds()[0].title, "two");
        assert_eq!(messenger.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_sends() {
        let messenger = RecordingMessenger::new(UserId(1));
        messenger.fail_sends(true);
        let err = messenger.send_message(ChannelId(5), "x").await.unwrap_err();
        assert!(matches!(err, ApiError::NotConnected));
        assert!(messenger.sent().is_empty());
    }
}
