//! Error types for the guildkit framework.

use std::path::PathBuf;

use thiserror::Error;

use guildkit_core::{ApiError, EventKind};

/// A boxed, thread-safe error used at extension boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Command errors
// =============================================================================

/// Errors returned by command entry points.
///
/// The dispatch pipeline renders every variant to the user as a titled
/// notice.  Only [`External`](Self::External) and [`Failed`](Self::Failed)
/// are logged as faults; syntax and permission problems are ordinary user
/// mistakes.
#[derive(Debug, Error)]
pub enum CommandError {
    /// User input did not parse.
    #[error("{0}")]
    Syntax(String),

    /// A capability check failed.
    #[error("{0}")]
    Permission(String),

    /// A messaging collaborator call failed.
    #[error("could not reach the chat service ({0})")]
    External(#[from] ApiError),

    /// Anything else the command body reported.
    #[error("{0}")]
    Failed(BoxError),
}

impl CommandError {
    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Creates a permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }

    /// Returns `true` for errors that indicate a fault rather than a user
    /// mistake.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::External(_) | Self::Failed(_))
    }
}

/// Result type for command entry points.
pub type CommandResult<T = ()> = Result<T, CommandError>;

// =============================================================================
// Registration errors
// =============================================================================

/// Problems found while loading and registering extensions.
///
/// None of these abort loading; each is logged and collected into the
/// [`LoadReport`](crate::extension::LoadReport) for the load that produced it.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The module file could not be mapped into the process.
    #[error("failed to open module {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The module does not export the extension declaration.
    #[error("module {path} does not export `{symbol}`")]
    MissingSymbol { path: PathBuf, symbol: &'static str },

    /// The module was built against an incompatible extension API.
    #[error("module {path} targets extension API {found}, host provides {expected}")]
    ApiVersion {
        path: PathBuf,
        found: String,
        expected: String,
    },

    /// The module was built against a different framework release.
    #[error("module {path} was built against guildkit-framework {found}, host runs {expected}")]
    FrameworkVersion {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    /// The extension's init entry point returned an error or panicked.
    #[error("extension `{origin}` failed to initialise: {reason}")]
    Init { origin: String, reason: String },

    /// Two extensions share a name.
    #[error("extension `{0}` is already registered")]
    DuplicateExtension(String),

    /// A response pattern is not a valid regular expression.
    #[error("response `{response}` of `{extension}` has invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        extension: String,
        response: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A command name or alias is already taken; the later registration is
    /// unreachable under that name.
    #[error("`{name}` from `{extension}` is shadowed by command `{owner}`")]
    NameCollision {
        name: String,
        extension: String,
        owner: String,
    },

    /// A scheduled job cannot run as declared.
    #[error("job `{job}` of `{extension}` is invalid: {reason}")]
    InvalidJob {
        extension: String,
        job: String,
        reason: String,
    },

    /// A raw handler expects a payload the event kind never carries.
    #[error("handler `{handler}` of `{extension}` expects {expected}, but {kind} events carry {found}")]
    PayloadMismatch {
        extension: String,
        handler: String,
        kind: EventKind,
        expected: &'static str,
        found: &'static str,
    },
}

impl RegistrationError {
    /// Returns `true` for name collisions.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::NameCollision { .. })
    }
}

// =============================================================================
// Store errors
// =============================================================================

/// Errors from snapshot and per-extension blob persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A snapshot file is required but absent.
    #[error("snapshot not found: {0}")]
    Missing(PathBuf),

    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be encoded or decoded.
    #[error("malformed data: {0}")]
    Codec(#[from] serde_json::Error),

    /// A blob was already decoded as a different type.
    #[error("configuration for `{extension}` was already loaded as a different type")]
    TypeMismatch { extension: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;
