//! The shared bot core and the contexts handed to extension code.
//!
//! - [`BotCore`] owns the guild store, the extension registry, the messenger,
//!   the per-extension configuration store and the job scheduler.  One
//!   `Arc<BotCore>` is shared by every dispatch.
//! - [`InitContext`] is what an extension's init entry point receives.
//! - [`CommandContext`], [`ResponseContext`], [`RawContext`] and
//!   [`JobContext`] are handed to the respective entry points.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use guildkit_core::{
    BoxedMessenger, Embed, EventKind, GuildId, MessageEvent, MessageHandle, UserId,
};

use crate::args::Args;
use crate::error::{CommandError, CommandResult, StoreResult};
use crate::extension::{ExtensionConfigStore, ExtensionRegistry, InitFn, LoadReport, ModuleLoader};
use crate::scheduler::JobScheduler;
use crate::store::GuildStore;

// =============================================================================
// BotCore
// =============================================================================

/// Everything a dispatch needs, shared across all concurrently running
/// handlers.
pub struct BotCore {
    store: GuildStore,
    registry: ExtensionRegistry,
    messenger: BoxedMessenger,
    configs: Arc<ExtensionConfigStore>,
    scheduler: JobScheduler,
    extension_dir: Option<PathBuf>,
}

impl BotCore {
    /// Starts building a core around `store` and `messenger`.
    pub fn builder(store: GuildStore, messenger: BoxedMessenger) -> BotCoreBuilder {
        BotCoreBuilder {
            store,
            messenger,
            loader: None,
            config_dir: PathBuf::from("extension_config"),
            extension_dir: None,
        }
    }

    pub fn store(&self) -> &GuildStore {
        &self.store
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn messenger(&self) -> &BoxedMessenger {
        &self.messenger
    }

    pub fn configs(&self) -> &Arc<ExtensionConfigStore> {
        &self.configs
    }

    /// The bot's own user id.
    pub fn self_id(&self) -> UserId {
        self.messenger.self_id()
    }

    /// Directory scanned for loadable modules, if any.
    pub fn extension_dir(&self) -> Option<&Path> {
        self.extension_dir.as_deref()
    }

    pub fn init_context(&self) -> InitContext {
        InitContext::new(Arc::clone(&self.configs), self.self_id())
    }

    /// Typed configuration attached by `extension` at init.
    pub fn extension_config<T: Send + Sync + 'static>(&self, extension: &str) -> Option<Arc<T>> {
        self.registry.extension_config(extension)
    }

    // ─── Extension lifecycle ─────────────────────────────────────────────────

    /// Registers a built-in extension.  Built-ins are re-initialised on every
    /// reload.
    pub async fn register_builtin(&self, init: InitFn) -> LoadReport {
        self.registry.register_builtin(init, &self.init_context()).await
    }

    /// Loads every module in the extension directory.
    pub async fn load_extensions(&self) -> LoadReport {
        match &self.extension_dir {
            Some(dir) => self.registry.load_all(dir, &self.init_context()).await,
            None => LoadReport::default(),
        }
    }

    /// Clears the dispatch tables and registers everything again.  Jobs
    /// that were running are restarted against the new tables.
    pub async fn reload_extensions(self: &Arc<Self>) -> LoadReport {
        let jobs_were_running = self.scheduler.stop();
        let report = self
            .registry
            .reload_all(self.extension_dir.as_deref(), &self.init_context())
            .await;
        if jobs_were_running {
            self.start_jobs();
        }
        report
    }

    // ─── Scheduled jobs ──────────────────────────────────────────────────────

    /// Starts every registered job, replacing any running generation.
    pub fn start_jobs(self: &Arc<Self>) {
        self.scheduler.start(self, &self.registry.snapshot());
    }

    /// Cancels every running job.
    pub fn stop_jobs(&self) {
        self.scheduler.stop();
    }
}

impl fmt::Debug for BotCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotCore")
            .field("self_id", &self.self_id())
            .field("guilds", &self.store.len())
            .field("registry", &self.registry)
            .field("extension_dir", &self.extension_dir)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BotCore`].
pub struct BotCoreBuilder {
    store: GuildStore,
    messenger: BoxedMessenger,
    loader: Option<Arc<dyn ModuleLoader>>,
    config_dir: PathBuf,
    extension_dir: Option<PathBuf>,
}

impl BotCoreBuilder {
    /// Module loader used for the extension directory.  Defaults to the
    /// shared-library loader when the `dylib` feature is enabled.
    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Directory holding per-extension configuration blobs.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Directory scanned for loadable modules.
    pub fn extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Arc<BotCore> {
        let loader = self.loader.unwrap_or_else(default_loader);
        Arc::new(BotCore {
            store: self.store,
            registry: ExtensionRegistry::new(loader),
            messenger: self.messenger,
            configs: Arc::new(ExtensionConfigStore::new(self.config_dir)),
            scheduler: JobScheduler::new(),
            extension_dir: self.extension_dir,
        })
    }
}

#[cfg(feature = "dylib")]
fn default_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(crate::extension::DylibLoader)
}

#[cfg(not(feature = "dylib"))]
fn default_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(crate::extension::CatalogLoader::new())
}

// =============================================================================
// InitContext
// =============================================================================

/// Handed to an extension's init entry point.
#[derive(Debug, Clone)]
pub struct InitContext {
    configs: Arc<ExtensionConfigStore>,
    self_id: UserId,
    module_path: Option<PathBuf>,
}

impl InitContext {
    pub fn new(configs: Arc<ExtensionConfigStore>, self_id: UserId) -> Self {
        Self {
            configs,
            self_id,
            module_path: None,
        }
    }

    pub(crate) fn for_module(&self, path: &Path) -> Self {
        Self {
            module_path: Some(path.to_path_buf()),
            ..self.clone()
        }
    }

    pub fn configs(&self) -> &ExtensionConfigStore {
        &self.configs
    }

    pub fn self_id(&self) -> UserId {
        self.self_id
    }

    /// File the extension was loaded from; `None` for built-ins.
    pub fn module_path(&self) -> Option<&Path> {
        self.module_path.as_deref()
    }

    /// Loads the typed configuration blob for `extension`.
    pub fn config<T>(&self, extension: &str) -> StoreResult<Arc<T>>
    where
        T: DeserializeOwned + Default + Send + Sync + 'static,
    {
        self.configs.load(extension)
    }
}

// =============================================================================
// Entry-point contexts
// =============================================================================

/// Handed to a command entry point.
#[derive(Clone)]
pub struct CommandContext {
    pub core: Arc<BotCore>,
    pub event: Arc<MessageEvent>,
    /// Canonical name of the resolved command.
    pub command: String,
    /// Name or alias the user typed, case-folded.
    pub invoked_as: String,
    pub args: Args,
}

impl CommandContext {
    pub fn store(&self) -> &GuildStore {
        self.core.store()
    }

    pub fn author(&self) -> UserId {
        self.event.author_id
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.event.guild_id
    }

    /// The owning community, or a syntax error in a direct message.
    pub fn require_guild(&self) -> CommandResult<GuildId> {
        self.event
            .guild_id
            .ok_or_else(|| CommandError::syntax("this command only works in a server"))
    }

    /// Sends `text` to the channel the command came from.
    pub async fn reply(&self, text: &str) -> CommandResult<MessageHandle> {
        Ok(self
            .core
            .messenger()
            .send_message(self.event.channel_id, text)
            .await?)
    }

    /// Sends `embed` to the channel the command came from.
    pub async fn reply_embed(&self, embed: &Embed) -> CommandResult<MessageHandle> {
        Ok(self
            .core
            .messenger()
            .send_embed(self.event.channel_id, embed)
            .await?)
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command)
            .field("invoked_as", &self.invoked_as)
            .field("args", &self.args)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Handed to a response entry point.
///
/// Responses return nothing; failures are theirs to report.
#[derive(Clone)]
pub struct ResponseContext {
    pub core: Arc<BotCore>,
    pub event: Arc<MessageEvent>,
    pub extension: Arc<str>,
    pub response: String,
}

impl ResponseContext {
    /// Sends `text` to the channel the message came from.
    pub async fn reply(&self, text: &str) -> guildkit_core::ApiResult<MessageHandle> {
        self.core
            .messenger()
            .send_message(self.event.channel_id, text)
            .await
    }
}

impl fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseContext")
            .field("extension", &self.extension)
            .field("response", &self.response)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Handed to a raw event handler, with the payload already downcast.
pub struct RawContext<T> {
    pub core: Arc<BotCore>,
    pub kind: EventKind,
    pub payload: Arc<T>,
}

impl<T> Clone for RawContext<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            kind: self.kind,
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<T: Any + fmt::Debug> fmt::Debug for RawContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawContext")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Handed to a scheduled job on every tick.
#[derive(Clone)]
pub struct JobContext {
    pub core: Arc<BotCore>,
    pub extension: Arc<str>,
    pub job: String,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("extension", &self.extension)
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}
