//! # guildkit Core
//!
//! The vocabulary shared by every guildkit layer: identifiers, the inbound
//! event model, and the outbound [`Messenger`] contract that the gateway
//! client implements.
//!
//! The core does not talk to any network itself.  A gateway integration
//! converts its wire events into [`RawEvent`]s and hands them to the runtime;
//! replies flow back out through whatever [`Messenger`] the integration
//! supplied.
//!
//! ```text
//! ┌───────────┐  RawEvent   ┌──────────┐   Messenger   ┌───────────┐
//! │  Gateway  │────────────▶│ Runtime  │──────────────▶│  Gateway  │
//! │ (inbound) │             │(dispatch)│               │  (REST)   │
//! └───────────┘             └──────────┘               └───────────┘
//! ```

pub mod error;
pub mod event;
pub mod id;
pub mod mention;
pub mod messenger;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ApiError, ApiResult};
pub use event::{EventKind, MemberEvent, MessageEvent, RawEvent, ReactionEvent};
pub use id::{ChannelId, GuildId, MessageId, UserId};
pub use mention::{mentions_user, parse_channel_mention, parse_user_mention};
pub use messenger::{BoxedMessenger, Embed, EmbedField, MessageHandle, Messenger};

/// Prelude for common imports.
pub mod prelude {
    pub use super::event::*;
    pub use super::id::*;
    pub use super::messenger::{BoxedMessenger, Embed, MessageHandle, Messenger};
    pub use super::{ApiError, ApiResult};
}
