//! Extensions: descriptors, the module ABI, loaders and the registry.
//!
//! # Lifecycle
//!
//! ```text
//! Discovered ─▶ Opened ─▶ Initialised ─▶ Registered ─▶ (running) ─▶ Unregistered
//!   file found   loader     init fn        merged into    reload clears
//!                maps it    returns a      dispatch       every table
//!                           descriptor     tables
//! ```
//!
//! Built-in extensions skip the first two steps: they are registered by an
//! explicit [`ExtensionRegistry::register_builtin`] call with their init
//! function.

mod config;
mod declaration;
mod descriptor;
mod loader;
mod registry;

pub use config::ExtensionConfigStore;
pub use declaration::{
    DECLARATION_SYMBOL, EXTENSION_API_VERSION, ExtensionDeclaration, FRAMEWORK_VERSION, InitFn,
};
pub use descriptor::{
    CommandDescriptor, CommandFn, ExtensionDescriptor, JobDescriptor, JobFn, RawHandlerDescriptor,
    ResponseDescriptor, ResponseFn, SELF_ID_PLACEHOLDER,
};
#[cfg(feature = "dylib")]
pub use loader::DylibLoader;
pub use loader::{CatalogLoader, LoadedModule, ModuleGuard, ModuleLoader};
pub use registry::{
    CommandEntry, DispatchTables, ExtensionInfo, ExtensionOrigin, ExtensionRegistry, JobEntry,
    LoadReport, RawHandlerEntry, ResponseEntry,
};
