//! Runtime configuration.
//!
//! Layered loading via figment (defaults, config files, `GUILDKIT_*`
//! environment variables, programmatic overrides) plus validation of the
//! result before the runtime acts on it.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, EXTENSION_DIR_ENV, Profile, apply_extension_dir_override};
pub use schema::{
    BotConfig, ExtensionsConfig, GuildkitConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig, StorageConfig,
};
pub use validation::validate_config;
