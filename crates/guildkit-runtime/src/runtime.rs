//! Runtime orchestration.
//!
//! The runtime owns one [`BotCore`] and everything around it: the snapshot
//! file, the autosave loop, the per-event task set and shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use guildkit_runtime::GuildkitRuntime;
//!
//! let runtime = GuildkitRuntime::builder()
//!     .messenger(gateway.messenger())
//!     .builtin(my_extension::init)
//!     .build()
//!     .await?;
//!
//! // From the gateway's receive loop:
//! runtime.handle_event(event);
//!
//! // Until Ctrl+C or SIGTERM, then a final snapshot save.
//! runtime.run().await?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use guildkit_core::{BoxedMessenger, RawEvent};
use guildkit_framework::builtin::core_extension;
use guildkit_framework::extension::{InitFn, ModuleLoader};
use guildkit_framework::{
    BotCore, EventReport, GlobalConfig, GuildStore, LoadReport, SnapshotFile, StoreError,
    handle_event,
};

use crate::config::{ConfigLoader, GuildkitConfig, apply_extension_dir_override, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Counters describing a running runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub guilds: usize,
    pub extensions: usize,
    pub commands: usize,
    /// Event and background tasks not yet finished.
    pub in_flight: usize,
}

/// Owns the bot core and drives it for the life of the process.
pub struct GuildkitRuntime {
    config: GuildkitConfig,
    core: Arc<BotCore>,
    snapshot: SnapshotFile,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl GuildkitRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &GuildkitConfig {
        &self.config
    }

    pub fn core(&self) -> &Arc<BotCore> {
        &self.core
    }

    pub fn stats(&self) -> RuntimeStats {
        let tables = self.core.registry().snapshot();
        RuntimeStats {
            guilds: self.core.store().len(),
            extensions: tables.extensions().count(),
            commands: tables.commands().count(),
            in_flight: self.tasks.len(),
        }
    }

    /// Dispatches one inbound event on its own task.
    ///
    /// Returns `None` once shutdown has begun; the event is dropped.
    pub fn handle_event(&self, event: RawEvent) -> Option<JoinHandle<EventReport>> {
        if self.shutdown.is_cancelled() {
            debug!(kind = %event.kind(), "Shutting down, event dropped");
            return None;
        }
        let core = Arc::clone(&self.core);
        Some(self.tasks.spawn(async move { handle_event(&core, event).await }))
    }

    /// Reloads extensions from the configured directory.
    pub async fn reload_extensions(&self) -> LoadReport {
        let report = self.core.reload_extensions().await;
        log_report("Extensions reloaded", &report);
        report
    }

    /// Writes the current store contents to the snapshot file.
    pub async fn save_snapshot(&self) -> RuntimeResult<()> {
        self.snapshot.save(&self.core.store().snapshot()).await?;
        Ok(())
    }

    /// Starts jobs and the autosave loop.  Calling it again does nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.start_jobs();
        self.spawn_autosave();
        info!(
            guilds = self.core.store().len(),
            autosave_secs = self.config.storage.autosave_secs,
            "guildkit runtime started"
        );
    }

    /// Stops accepting events, waits for in-flight ones, then saves.
    pub async fn stop(&self) -> RuntimeResult<()> {
        self.shutdown.cancel();
        self.core.stop_jobs();
        self.tasks.close();
        self.tasks.wait().await;

        let result = self.save_snapshot().await;
        match &result {
            Ok(()) => info!(path = %self.snapshot.path().display(), "Final snapshot saved"),
            Err(e) => error!(error = %e, "Final snapshot save failed"),
        }
        result
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start();
        shutdown.await;
        self.stop().await
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start();
        info!("guildkit runtime is now running. Press Ctrl+C to stop.");
        let waited = wait_for_shutdown().await;
        if let Err(e) = &waited {
            error!(error = %e, "Shutdown signal unavailable, stopping");
        }
        self.stop().await?;
        waited
    }

    fn spawn_autosave(&self) {
        let period = Duration::from_secs(self.config.storage.autosave_secs);
        let core = Arc::clone(&self.core);
        let snapshot = self.snapshot.clone();
        let token = self.shutdown.clone();

        self.tasks.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match snapshot.save(&core.store().snapshot()).await {
                            Ok(()) => debug!("Autosave complete"),
                            Err(e) => error!(error = %e, "Autosave failed"),
                        }
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for GuildkitRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildkitRuntime")
            .field("core", &self.core)
            .field("snapshot", &self.snapshot.path())
            .field("stopping", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

fn log_report(what: &str, report: &LoadReport) {
    info!(
        loaded = ?report.loaded,
        faults = report.faults.len(),
        "{what}"
    );
    for fault in &report.faults {
        warn!(error = %fault, "Extension registration fault");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`GuildkitRuntime`].
///
/// The built-in `core` extension is always registered first; further
/// built-ins follow in the order they were added.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<GuildkitConfig>,
    messenger: Option<BoxedMessenger>,
    builtins: Vec<InitFn>,
    loader: Option<Arc<dyn ModuleLoader>>,
    create_if_missing: bool,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            messenger: None,
            builtins: vec![core_extension as InitFn],
            loader: None,
            create_if_missing: false,
            init_logging: true,
        }
    }

    /// Loads configuration from exactly this file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` instead of loading from files and environment.  It is
    /// still validated, and [`EXTENSION_DIR_ENV`](crate::config::EXTENSION_DIR_ENV)
    /// still overrides its extension directory unless
    /// [`without_env`](Self::without_env) is set.
    pub fn config(mut self, config: GuildkitConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Outbound messaging for the gateway in use.  Required.
    pub fn messenger(mut self, messenger: BoxedMessenger) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Adds a built-in extension.  Built-ins survive every reload.
    pub fn builtin(mut self, init: InitFn) -> Self {
        self.builtins.push(init);
        self
    }

    /// Replaces the default module loader.
    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Starts from an empty store when the snapshot file does not exist.
    /// A snapshot that exists but cannot be decoded is always fatal.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub async fn build(self) -> RuntimeResult<GuildkitRuntime> {
        let config = match self.config {
            Some(mut config) => {
                if self.config_loader.uses_env() {
                    apply_extension_dir_override(&mut config);
                }
                config
            }
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let messenger = self.messenger.ok_or(RuntimeError::MissingMessenger)?;

        let snapshot = SnapshotFile::new(&config.storage.snapshot_path);
        let global = match snapshot.load().await {
            Ok(global) => global,
            Err(StoreError::Missing(path)) if self.create_if_missing => {
                warn!(path = %path.display(), "No snapshot found, starting empty");
                GlobalConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        let store = GuildStore::from_snapshot(global, config.bot.default_prefix.as_str())
            .with_operator_fallback(config.bot.operator_id);

        let mut core = BotCore::builder(store, messenger)
            .config_dir(&config.storage.extension_config_dir)
            .extension_dir(&config.extensions.dir);
        if let Some(loader) = self.loader {
            core = core.loader(loader);
        }
        let core = core.build();

        let mut report = LoadReport::default();
        for init in self.builtins {
            report.extend(core.register_builtin(init).await);
        }
        report.extend(core.load_extensions().await);
        log_report("Extensions loaded", &report);

        info!(
            guilds = core.store().len(),
            default_prefix = %config.bot.default_prefix,
            extension_dir = %config.extensions.dir.display(),
            "guildkit runtime initialized"
        );

        Ok(GuildkitRuntime {
            config,
            core,
            snapshot,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }
}
