//! Module loaders: turn a file on disk into an init entry point.
//!
//! [`DylibLoader`] maps shared libraries with `libloading`.
//! [`CatalogLoader`] resolves file stems against an in-process table, which
//! is how statically linked deployments and tests supply "modules".

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::declaration::InitFn;
use crate::error::RegistrationError;

/// Keeps a mapped module alive.  Every table entry built from the module
/// holds a clone; the module is unmapped only after the last one drops.
pub type ModuleGuard = Arc<dyn Any + Send + Sync>;

/// An opened module, ready to initialise.
pub struct LoadedModule {
    pub init: InitFn,
    pub guard: Option<ModuleGuard>,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("guarded", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

/// Opens loadable modules.
pub trait ModuleLoader: Send + Sync {
    /// Returns `true` if `path` looks like a module this loader can open.
    /// Other directory entries are ignored.
    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
    }

    /// Maps `path` and resolves its entry point.
    fn open(&self, path: &Path) -> Result<LoadedModule, RegistrationError>;
}

// ─── DylibLoader ─────────────────────────────────────────────────────────────

/// Loads shared libraries exporting an
/// [`ExtensionDeclaration`](super::ExtensionDeclaration).
#[cfg(feature = "dylib")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

#[cfg(feature = "dylib")]
impl ModuleLoader for DylibLoader {
    fn open(&self, path: &Path) -> Result<LoadedModule, RegistrationError> {
        use super::declaration::{DECLARATION_SYMBOL, ExtensionDeclaration, FRAMEWORK_VERSION};

        // SAFETY: loading runs the library's initialisers.  Extensions are
        // fully trusted code.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            RegistrationError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        // SAFETY: the symbol is a `static ExtensionDeclaration` emitted by
        // `export_extension!`.  The declaration is `Copy`, so it is read out
        // while the library is still mapped.
        let declaration = unsafe {
            let symbol = library
                .get::<*const ExtensionDeclaration>(DECLARATION_SYMBOL)
                .map_err(|_| RegistrationError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: "GUILDKIT_EXTENSION",
                })?;
            (*symbol).read()
        };

        if !declaration.is_compatible() {
            return Err(RegistrationError::ApiVersion {
                path: path.to_path_buf(),
                found: ExtensionDeclaration::format_version(declaration.api_version),
                expected: ExtensionDeclaration::format_version(super::EXTENSION_API_VERSION),
            });
        }
        if declaration.framework_version != FRAMEWORK_VERSION {
            return Err(RegistrationError::FrameworkVersion {
                path: path.to_path_buf(),
                found: declaration.framework_version.to_string(),
                expected: FRAMEWORK_VERSION,
            });
        }

        Ok(LoadedModule {
            init: declaration.init,
            guard: Some(Arc::new(library)),
        })
    }
}

// ─── CatalogLoader ───────────────────────────────────────────────────────────

/// Resolves module files by stem against a table of init functions.
///
/// A file `starboard.so` (or `.dll`, `.dylib`) opens the entry registered
/// under `"starboard"`.  Entries can be added and removed at any time; the
/// next load sees the change.
#[derive(Default)]
pub struct CatalogLoader {
    entries: RwLock<HashMap<String, InitFn>>,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    pub fn with(self, stem: impl Into<String>, init: InitFn) -> Self {
        self.insert(stem, init);
        self
    }

    pub fn insert(&self, stem: impl Into<String>, init: InitFn) {
        self.entries.write().insert(stem.into(), init);
    }

    pub fn remove(&self, stem: &str) -> bool {
        self.entries.write().remove(stem).is_some()
    }
}

impl fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stems: Vec<_> = self.entries.read().keys().cloned().collect();
        stems.sort();
        f.debug_struct("CatalogLoader").field("stems", &stems).finish()
    }
}

impl ModuleLoader for CatalogLoader {
    fn open(&self, path: &Path) -> Result<LoadedModule, RegistrationError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let init = self
            .entries
            .read()
            .get(stem)
            .copied()
            .ok_or_else(|| RegistrationError::MissingSymbol {
                path: path.to_path_buf(),
                symbol: "GUILDKIT_EXTENSION",
            })?;

        Ok(LoadedModule { init, guard: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitContext;
    use crate::error::BoxError;
    use crate::extension::ExtensionDescriptor;

    fn init(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("demo", "1.0.0"))
    }

    fn module_file(stem: &str) -> String {
        format!("{stem}.{}", std::env::consts::DLL_EXTENSION)
    }

    #[test]
    fn test_candidates_match_platform_suffix() {
        let loader = CatalogLoader::new();
        assert!(loader.is_candidate(Path::new(&module_file("demo"))));
        assert!(!loader.is_candidate(Path::new("demo.txt")));
        assert!(!loader.is_candidate(Path::new("README")));
    }

    #[test]
    fn test_catalog_resolves_by_stem() {
        let loader = CatalogLoader::new().with("demo", init);
        let module = loader.open(Path::new(&module_file("demo"))).unwrap();
        assert!(module.guard.is_none());

        assert!(loader.remove("demo"));
        let err = loader.open(Path::new(&module_file("demo"))).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingSymbol { .. }));
    }

    #[cfg(feature = "dylib")]
    #[test]
    fn test_dylib_rejects_non_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(module_file("broken"));
        std::fs::write(&path, b"not a shared library").unwrap();

        let err = DylibLoader.open(&path).unwrap_err();
        assert!(matches!(err, RegistrationError::Open { .. }));
    }
}
