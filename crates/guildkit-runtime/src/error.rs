//! Runtime error types.

use thiserror::Error;

use guildkit_framework::StoreError;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The snapshot could not be loaded or saved.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] StoreError),

    /// `build` was called without a messenger.
    #[error("No messenger configured")]
    MissingMessenger,

    /// A shutdown signal handler could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
