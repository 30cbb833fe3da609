//! # guildkit Framework
//!
//! The configuration-and-dispatch core every feature builds on.
//!
//! This layer provides:
//! - [`store`]: one configuration record per community behind per-community
//!   locks, with a prefix cache kept consistent inside the same critical
//!   section, plus the persisted snapshot model
//! - [`extension`]: extension descriptors, the loadable-module ABI, module
//!   loaders, the registry and per-extension typed configuration
//! - [`dispatch`]: the command pipeline, the auto-response engine and raw
//!   event handlers
//! - the built-in `core` extension, argument helpers, capability checks and
//!   the job scheduler
//!
//! Transport is not handled here.  Events arrive as
//! [`RawEvent`](guildkit_core::RawEvent)s and replies go out through the
//! [`Messenger`](guildkit_core::Messenger) the core was built with.

pub mod args;
pub mod builtin;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod extension;
pub mod permission;
pub mod store;

mod scheduler;

pub use args::Args;
pub use context::{
    BotCore, BotCoreBuilder, CommandContext, InitContext, JobContext, RawContext, ResponseContext,
};
pub use dispatch::{
    DispatchOutcome, EventReport, dispatch_command, handle_event, run_raw_handlers, run_responses,
};
pub use error::{
    BoxError, CommandError, CommandResult, RegistrationError, StoreError, StoreResult,
};
pub use extension::{
    CommandDescriptor, ExtensionDescriptor, ExtensionRegistry, JobDescriptor, LoadReport,
    RawHandlerDescriptor, ResponseDescriptor,
};
pub use permission::{require_operator, require_permission};
pub use store::{GlobalConfig, GuildRecord, GuildStore, SnapshotFile};

/// Prelude for extension authors.
pub mod prelude {
    pub use super::args::Args;
    pub use super::context::{
        BotCore, CommandContext, InitContext, JobContext, RawContext, ResponseContext,
    };
    pub use super::error::{BoxError, CommandError, CommandResult};
    pub use super::extension::{
        CommandDescriptor, ExtensionDescriptor, JobDescriptor, RawHandlerDescriptor,
        ResponseDescriptor,
    };
    pub use super::permission::{require_operator, require_permission};
    pub use super::store::GuildRecord;
    pub use guildkit_core::prelude::*;
}
