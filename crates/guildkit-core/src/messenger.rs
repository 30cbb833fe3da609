//! The outbound messaging contract.
//!
//! A [`Messenger`] is supplied by the gateway integration.  Every call returns
//! an [`ApiResult`]; the runtime never retries on its own, and any timeout is
//! owned by the implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::id::{ChannelId, MessageId, UserId};

/// Handle to a message that was sent (or received) and can be edited or
/// reacted to later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl MessageHandle {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

/// One name/value row of an [`Embed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Rich content: a titled notice with optional fields.
///
/// ```rust,ignore
/// let embed = Embed::new("`prefix` failed")
///     .description("prefix must not contain spaces")
///     .color(Embed::ERROR_COLOR);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// Accent used for failure notices.
    pub const ERROR_COLOR: u32 = 0xE7_4C_3C;
    /// Accent used for informational notices.
    pub const INFO_COLOR: u32 = 0x34_98_DB;

    /// Creates an embed with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// Outbound calls the runtime and its extensions make against the gateway.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// The bot's own user id.
    fn self_id(&self) -> UserId;

    /// Posts plain text to a channel.
    async fn send_message(&self, channel: ChannelId, text: &str) -> ApiResult<MessageHandle>;

    /// Posts rich content to a channel.
    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> ApiResult<MessageHandle>;

    /// Replaces the text of a message previously sent by the bot.
    async fn edit_message(&self, message: MessageHandle, text: &str) -> ApiResult<()>;

    /// Adds a reaction to a message.
    async fn react(&self, message: MessageHandle, emoji: &str) -> ApiResult<()>;

    /// Lists the users who reacted to a message with `emoji`.
    async fn list_reactors(&self, message: MessageHandle, emoji: &str) -> ApiResult<Vec<UserId>>;
}

/// A shared messenger trait object.
pub type BoxedMessenger = Arc<dyn Messenger>;
