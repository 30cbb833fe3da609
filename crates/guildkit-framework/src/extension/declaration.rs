//! The exported declaration a loadable module provides.
//!
//! A module built as a `cdylib` exposes one `static` named
//! `GUILDKIT_EXTENSION`.  The host reads it, checks the versions it carries
//! and calls its init entry point to obtain an [`ExtensionDescriptor`].
//!
//! ```rust,ignore
//! use guildkit_framework::prelude::*;
//!
//! fn init(ctx: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
//!     Ok(ExtensionDescriptor::new("starboard", "0.3.0"))
//! }
//!
//! guildkit_framework::export_extension!(init);
//! ```
//!
//! Descriptors carry Rust closures across the module boundary, so the module
//! and the host must be built by the same compiler against the same
//! framework release.  The framework version check enforces the latter.

use crate::context::InitContext;
use crate::error::BoxError;
use crate::extension::ExtensionDescriptor;

// ─── API versioning ──────────────────────────────────────────────────────────

/// Current extension API version (1.0).
pub const EXTENSION_API_VERSION: u32 = 0x0001_0000;

/// Framework release modules must be built against.
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exported symbol name, NUL-terminated for the dynamic loader.
pub const DECLARATION_SYMBOL: &[u8] = b"GUILDKIT_EXTENSION\0";

/// Init entry point.
pub type InitFn = fn(&InitContext) -> Result<ExtensionDescriptor, BoxError>;

// ─── ExtensionDeclaration ────────────────────────────────────────────────────

/// The static a loadable module exports.
///
/// `#[repr(C)]`; fields must not be reordered.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ExtensionDeclaration {
    /// Extension API version the module was compiled against.
    pub api_version: u32,

    /// `guildkit-framework` version the module was compiled against.
    pub framework_version: &'static str,

    /// Builds the module's descriptor.
    pub init: InitFn,
}

impl ExtensionDeclaration {
    /// Declares `init` against the running API and framework versions.
    pub const fn new(init: InitFn) -> Self {
        Self {
            api_version: EXTENSION_API_VERSION,
            framework_version: FRAMEWORK_VERSION,
            init,
        }
    }

    /// Returns `true` if this declaration's API version is compatible with
    /// the host.
    ///
    /// The major part must match exactly; the module's minor part must be
    /// at most the host's.
    pub fn is_compatible(&self) -> bool {
        let host_major = EXTENSION_API_VERSION >> 16;
        let host_minor = EXTENSION_API_VERSION & 0xFFFF;
        let major = self.api_version >> 16;
        let minor = self.api_version & 0xFFFF;
        major == host_major && minor <= host_minor
    }

    /// Renders an API version as `major.minor`.
    pub fn format_version(version: u32) -> String {
        format!("{}.{}", version >> 16, version & 0xFFFF)
    }
}

/// Exports `init` as this crate's extension entry point.
///
/// Expands to the `GUILDKIT_EXTENSION` static the host looks up.  Use it
/// once, at the root of a `cdylib` crate.
#[macro_export]
macro_rules! export_extension {
    ($init:path) => {
        #[unsafe(no_mangle)]
        pub static GUILDKIT_EXTENSION: $crate::extension::ExtensionDeclaration =
            $crate::extension::ExtensionDeclaration::new($init);
    };
}
