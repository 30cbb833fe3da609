//! guildkit Runtime - process-level orchestration for a guildkit bot.
//!
//! This crate provides:
//! - Layered configuration (`config`): defaults, `guildkit.toml`,
//!   `GUILDKIT_*` environment variables, validation
//! - Logging initialization on `tracing-subscriber` (`logging`)
//! - The runtime (`GuildkitRuntime`): snapshot load, extension loading,
//!   one task per inbound event, scheduled jobs, autosave and graceful
//!   shutdown with a final save
//!
//! The gateway connection itself lives outside this crate.  It supplies a
//! [`Messenger`](guildkit_core::Messenger) to the builder and feeds
//! [`RawEvent`](guildkit_core::RawEvent)s into
//! [`GuildkitRuntime::handle_event`].

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GuildkitConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{GuildkitRuntime, RuntimeBuilder, RuntimeStats};

// Re-export tracing for extension crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
