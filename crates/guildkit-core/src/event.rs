//! Inbound event model.
//!
//! The gateway delivers events of a handful of kinds.  Each kind carries one
//! concrete payload type; [`RawEvent`] wraps the payload in an `Arc` so that a
//! single event can be handed to many concurrently running handlers without
//! copying.
//!
//! Handlers registered against a raw [`EventKind`] receive the payload as
//! `Arc<dyn Any>`.  [`EventKind::payload_type`] is the declared shape for that
//! kind, which lets the registry reject a handler expecting the wrong payload
//! before it is ever invoked.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, GuildId, MessageId, UserId};

// ============================================================================
// Payloads
// ============================================================================

/// A text message posted in a community channel or a direct conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// The message's own id.
    pub id: MessageId,
    /// Owning community, or `None` for a direct message.
    pub guild_id: Option<GuildId>,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Author of the message.
    pub author_id: UserId,
    /// Whether the author is an automated account.
    #[serde(default)]
    pub author_is_bot: bool,
    /// Raw message text.
    pub content: String,
}

impl MessageEvent {
    /// Returns `true` when the message did not originate in a community.
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// A reaction added to, or removed from, a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    /// Unicode emoji or custom emoji name.
    pub emoji: String,
}

/// A member joining a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvent {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

// ============================================================================
// EventKind
// ============================================================================

/// The kinds of inbound event the runtime understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageCreated,
    ReactionAdded,
    ReactionRemoved,
    MemberJoined,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 4] = [
        EventKind::MessageCreated,
        EventKind::ReactionAdded,
        EventKind::ReactionRemoved,
        EventKind::MemberJoined,
    ];

    /// Stable name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageCreated => "message_created",
            Self::ReactionAdded => "reaction_added",
            Self::ReactionRemoved => "reaction_removed",
            Self::MemberJoined => "member_joined",
        }
    }

    /// The payload type carried by events of this kind.
    pub fn payload_type(self) -> TypeId {
        match self {
            Self::MessageCreated => TypeId::of::<MessageEvent>(),
            Self::ReactionAdded | Self::ReactionRemoved => TypeId::of::<ReactionEvent>(),
            Self::MemberJoined => TypeId::of::<MemberEvent>(),
        }
    }

    /// Human-readable name of [`payload_type`](Self::payload_type).
    pub fn payload_name(self) -> &'static str {
        match self {
            Self::MessageCreated => std::any::type_name::<MessageEvent>(),
            Self::ReactionAdded | Self::ReactionRemoved => {
                std::any::type_name::<ReactionEvent>()
            }
            Self::MemberJoined => std::any::type_name::<MemberEvent>(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RawEvent
// ============================================================================

/// An inbound event as delivered by the gateway.
#[derive(Debug, Clone)]
pub enum RawEvent {
    MessageCreated(Arc<MessageEvent>),
    ReactionAdded(Arc<ReactionEvent>),
    ReactionRemoved(Arc<ReactionEvent>),
    MemberJoined(Arc<MemberEvent>),
}

impl RawEvent {
    /// Returns this event's kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::ReactionAdded(_) => EventKind::ReactionAdded,
            Self::ReactionRemoved(_) => EventKind::ReactionRemoved,
            Self::MemberJoined(_) => EventKind::MemberJoined,
        }
    }

    /// Returns the owning community, if any.
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::MessageCreated(m) => m.guild_id,
            Self::ReactionAdded(r) | Self::ReactionRemoved(r) => r.guild_id,
            Self::MemberJoined(m) => Some(m.guild_id),
        }
    }

    /// Returns the payload type-erased, for raw handler dispatch.
    pub fn payload(&self) -> Arc<dyn Any + Send + Sync> {
        match self {
            Self::MessageCreated(m) => m.clone(),
            Self::ReactionAdded(r) | Self::ReactionRemoved(r) => r.clone(),
            Self::MemberJoined(m) => m.clone(),
        }
    }

    /// Returns the message payload when this is a message event.
    pub fn as_message(&self) -> Option<&Arc<MessageEvent>> {
        match self {
            Self::MessageCreated(m) => Some(m),
            _ => None,
        }
    }
}

impl From<MessageEvent> for RawEvent {
    fn from(event: MessageEvent) -> Self {
        Self::MessageCreated(Arc::new(event))
    }
}

impl From<MemberEvent> for RawEvent {
    fn from(event: MemberEvent) -> Self {
        Self::MemberJoined(Arc::new(event))
    }
}
