//! # guildkit
//!
//! A configuration-and-dispatch runtime for community chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐ RawEvent ┌──────────────────┐     ┌───────────────────────────────┐
//! │ Gateway │─────────▶│ GuildkitRuntime  │────▶│ command pipeline              │
//! └─────────┘          │ (one task/event) │────▶│ auto-response engine          │──▶ Messenger
//!                      └──────────────────┘────▶│ raw event handlers            │
//!                               │               └───────────────────────────────┘
//!                               ▼                          │
//!                      ┌──────────────────┐                ▼
//!                      │ snapshot file    │◀───── GuildStore (one lock per guild)
//!                      └──────────────────┘
//! ```
//!
//! - **Core**: identifiers, the inbound event model, the [`Messenger`](core::Messenger) contract
//! - **Framework**: guild store, extension registry, dispatch, built-in `core` extension
//! - **Runtime**: configuration, logging, snapshot persistence, shutdown
//!
//! ## Writing an extension
//!
//! ```rust,ignore
//! use guildkit::prelude::*;
//!
//! fn init(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
//!     Ok(ExtensionDescriptor::new("dice", "1.0.0").command(
//!         CommandDescriptor::new("roll", |ctx: CommandContext| async move {
//!             let sides: u32 = ctx.args.parse(1, "a number of sides")?;
//!             ctx.reply(&format!("d{sides}")).await?;
//!             Ok(())
//!         })
//!         .alias("r"),
//!     ))
//! }
//!
//! // Built into the binary:
//! GuildkitRuntime::builder().builtin(init);
//!
//! // Or compiled as a `cdylib` and dropped into the extension directory:
//! guildkit::framework::export_extension!(init);
//! ```

pub use guildkit_core as core;
pub use guildkit_framework as framework;
pub use guildkit_runtime as runtime;

/// Commonly used types for bot binaries and extensions.
pub mod prelude {
    pub use guildkit_framework::prelude::*;
    pub use guildkit_runtime::prelude::*;
    pub use guildkit_runtime::{GuildkitConfig, GuildkitRuntime, RuntimeError, RuntimeResult};
}
