//! The extension registry and the dispatch tables it publishes.
//!
//! # Publication
//!
//! Dispatch reads an immutable [`DispatchTables`] snapshot.  Registration
//! builds the next snapshot from a copy of the current one and swaps it in
//! under a write lock held only for the pointer swap.  Dispatch never waits
//! on registration, and a dispatch that already holds a snapshot finishes
//! against it even if a reload publishes new tables meanwhile.
//!
//! Registration itself is serialised by a separate async mutex.
//!
//! # Reload
//!
//! [`ExtensionRegistry::reload_all`] first publishes empty tables, then
//! registers built-ins and the directory's modules again.  Dispatch in the
//! gap simply finds nothing.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, error, info, warn};

use guildkit_core::{EventKind, MessageEvent, UserId};

use super::declaration::InitFn;
use super::descriptor::{
    CommandDescriptor, ExtensionDescriptor, JobDescriptor, RawHandlerDescriptor,
    ResponseDescriptor, SELF_ID_PLACEHOLDER,
};
use super::loader::{ModuleGuard, ModuleLoader};
use crate::context::InitContext;
use crate::error::RegistrationError;

// =============================================================================
// Table entries
// =============================================================================
//
// Entries built from a dynamically loaded module hold its guard as their last
// field.  Fields drop in declaration order, so the module's closures are gone
// before the module can be unmapped.

/// A registered command.
#[derive(Debug)]
pub struct CommandEntry {
    pub extension: Arc<str>,
    pub descriptor: CommandDescriptor,
    _module: Option<ModuleGuard>,
}

/// A registered auto-response with its compiled patterns.
#[derive(Debug)]
pub struct ResponseEntry {
    pub extension: Arc<str>,
    pub descriptor: ResponseDescriptor,
    compiled: Mutex<Option<(UserId, Arc<[Regex]>)>>,
    _module: Option<ModuleGuard>,
}

/// A registered raw event handler.
#[derive(Debug)]
pub struct RawHandlerEntry {
    pub extension: Arc<str>,
    pub descriptor: RawHandlerDescriptor,
    _module: Option<ModuleGuard>,
}

/// A registered scheduled job.
#[derive(Debug)]
pub struct JobEntry {
    pub extension: Arc<str>,
    pub descriptor: JobDescriptor,
    _module: Option<ModuleGuard>,
}

/// Where an extension came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOrigin {
    Builtin,
    Module(PathBuf),
}

/// Summary of a registered extension.
pub struct ExtensionInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub origin: ExtensionOrigin,
    /// Canonical names of the commands it declared.
    pub commands: Vec<String>,
    pub responses: usize,
    pub jobs: usize,
    pub handlers: usize,
    config: Option<Arc<dyn Any + Send + Sync>>,
    _module: Option<ModuleGuard>,
}

impl std::fmt::Debug for ExtensionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("origin", &self.origin)
            .field("commands", &self.commands)
            .field("responses", &self.responses)
            .field("jobs", &self.jobs)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl ResponseEntry {
    /// Patterns with the placeholder replaced by `self_id`, compiled once per
    /// identity.
    pub(crate) fn regexes(&self, self_id: UserId) -> Arc<[Regex]> {
        let mut compiled = self.compiled.lock();
        if let Some((id, regexes)) = compiled.as_ref()
            && *id == self_id
        {
            return Arc::clone(regexes);
        }

        let regexes: Arc<[Regex]> = match compile_patterns(&self.descriptor.patterns, &self_id.to_string()) {
            Ok(regexes) => regexes.into(),
            Err((pattern, e)) => {
                // Validated at registration with a stand-in id; only reachable
                // if the real id changes the pattern's meaning.
                error!(
                    extension = %self.extension,
                    response = %self.descriptor.name,
                    pattern = %pattern,
                    error = %e,
                    "Response pattern failed to compile, response disabled"
                );
                Arc::from(Vec::new())
            }
        };
        *compiled = Some((self_id, Arc::clone(&regexes)));
        regexes
    }

    /// Returns `true` if this response should fire for `event`.
    pub fn should_fire(&self, event: &MessageEvent, self_id: UserId) -> bool {
        let descriptor = &self.descriptor;
        if !threshold_met(&self.regexes(self_id), &event.content, descriptor.match_min) {
            return false;
        }
        if !descriptor.channels.is_empty() && !descriptor.channels.contains(&event.channel_id) {
            return false;
        }
        if !descriptor.users.is_empty() && !descriptor.users.contains(&event.author_id) {
            return false;
        }
        true
    }
}

impl ExtensionInfo {
    /// The extension's typed configuration, if it attached one of type `T`.
    pub fn config<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.config.clone()?.downcast().ok()
    }
}

/// Counts matching patterns in order, stopping once `match_min` is reached.
///
/// A `match_min` of zero or less is met before any pattern is evaluated.
pub(crate) fn threshold_met(patterns: &[Regex], text: &str, match_min: i32) -> bool {
    if match_min <= 0 {
        return true;
    }
    let mut count = 0;
    for pattern in patterns {
        if pattern.is_match(text) {
            count += 1;
            if count >= match_min {
                return true;
            }
        }
    }
    false
}

fn compile_patterns(patterns: &[String], self_id: &str) -> Result<Vec<Regex>, (String, regex::Error)> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&pattern.replace(SELF_ID_PLACEHOLDER, self_id))
                .map_err(|e| (pattern.clone(), e))
        })
        .collect()
}

// =============================================================================
// DispatchTables
// =============================================================================

/// One published generation of commands, responses, handlers and jobs.
#[derive(Debug, Clone, Default)]
pub struct DispatchTables {
    commands: Vec<Arc<CommandEntry>>,
    /// Lower-case name or alias → index into `commands`.  First registrant
    /// wins.
    index: HashMap<String, usize>,
    responses: Vec<Arc<ResponseEntry>>,
    handlers: HashMap<EventKind, Vec<Arc<RawHandlerEntry>>>,
    jobs: Vec<Arc<JobEntry>>,
    extensions: IndexMap<String, Arc<ExtensionInfo>>,
}

impl DispatchTables {
    /// Resolves a command by name or alias, case-insensitively.
    pub fn command(&self, name: &str) -> Option<&Arc<CommandEntry>> {
        let index = match self.index.get(name) {
            Some(index) => *index,
            None => *self.index.get(&name.to_lowercase())?,
        };
        self.commands.get(index)
    }

    /// Commands reachable under their canonical name, in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<CommandEntry>> {
        self.commands
            .iter()
            .enumerate()
            .filter(|(i, entry)| self.index.get(&entry.descriptor.name) == Some(i))
            .map(|(_, entry)| entry)
    }

    pub fn responses(&self) -> &[Arc<ResponseEntry>] {
        &self.responses
    }

    pub fn handlers_for(&self, kind: EventKind) -> &[Arc<RawHandlerEntry>] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn jobs(&self) -> &[Arc<JobEntry>] {
        &self.jobs
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Arc<ExtensionInfo>> {
        self.extensions.values()
    }

    pub fn extension(&self, name: &str) -> Option<&Arc<ExtensionInfo>> {
        self.extensions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Merges one extension into this generation.  Faults are appended to
    /// `report`; nothing here aborts the merge of other extensions.
    fn merge(
        &mut self,
        descriptor: ExtensionDescriptor,
        origin: ExtensionOrigin,
        guard: Option<ModuleGuard>,
        report: &mut LoadReport,
    ) {
        if self.extensions.contains_key(&descriptor.name) {
            report.fault(RegistrationError::DuplicateExtension(descriptor.name));
            return;
        }

        let ExtensionDescriptor {
            name,
            description,
            version,
            commands,
            responses,
            jobs,
            handlers,
            config,
        } = descriptor;
        let extension: Arc<str> = Arc::from(name.as_str());

        let mut command_names = Vec::with_capacity(commands.len());
        for command in commands {
            let slot = self.commands.len();
            for alias in command.names() {
                match self.index.get(alias) {
                    // Repeated within this command's own names.
                    Some(&owner) if owner == slot => {}
                    Some(&owner) => report.fault(RegistrationError::NameCollision {
                        name: alias.to_string(),
                        extension: name.clone(),
                        owner: self
                            .commands
                            .get(owner)
                            .map(|entry| entry.descriptor.name.clone())
                            .unwrap_or_default(),
                    }),
                    None => {
                        self.index.insert(alias.to_string(), slot);
                    }
                }
            }
            command_names.push(command.name.clone());
            self.commands.push(Arc::new(CommandEntry {
                extension: Arc::clone(&extension),
                descriptor: command,
                _module: guard.clone(),
            }));
        }

        let mut response_count = 0;
        for response in responses {
            if let Err((pattern, source)) = compile_patterns(&response.patterns, "0") {
                report.fault(RegistrationError::InvalidPattern {
                    extension: name.clone(),
                    response: response.name.clone(),
                    pattern,
                    source,
                });
                continue;
            }
            if response.match_min > 0 && response.match_min as usize > response.patterns.len() {
                warn!(
                    extension = %name,
                    response = %response.name,
                    match_min = response.match_min,
                    patterns = response.patterns.len(),
                    "Response requires more matches than it has patterns and will never fire"
                );
            }
            self.responses.push(Arc::new(ResponseEntry {
                extension: Arc::clone(&extension),
                descriptor: response,
                compiled: Mutex::new(None),
                _module: guard.clone(),
            }));
            response_count += 1;
        }

        let mut handler_count = 0;
        for handler in handlers {
            if !handler.accepts_kind() {
                report.fault(RegistrationError::PayloadMismatch {
                    extension: name.clone(),
                    handler: handler.name.clone(),
                    kind: handler.kind,
                    expected: handler.expected_name,
                    found: handler.kind.payload_name(),
                });
                continue;
            }
            self.handlers
                .entry(handler.kind)
                .or_default()
                .push(Arc::new(RawHandlerEntry {
                    extension: Arc::clone(&extension),
                    descriptor: handler,
                    _module: guard.clone(),
                }));
            handler_count += 1;
        }

        let mut job_count = 0;
        for job in jobs {
            if job.interval.is_zero() {
                report.fault(RegistrationError::InvalidJob {
                    extension: name.clone(),
                    job: job.name.clone(),
                    reason: "interval must be greater than zero".into(),
                });
                continue;
            }
            self.jobs.push(Arc::new(JobEntry {
                extension: Arc::clone(&extension),
                descriptor: job,
                _module: guard.clone(),
            }));
            job_count += 1;
        }

        info!(
            extension = %name,
            version = %version,
            commands = command_names.len(),
            responses = response_count,
            handlers = handler_count,
            jobs = job_count,
            "Extension registered"
        );

        self.extensions.insert(
            name.clone(),
            Arc::new(ExtensionInfo {
                name: name.clone(),
                description,
                version,
                origin,
                commands: command_names,
                responses: response_count,
                jobs: job_count,
                handlers: handler_count,
                config,
                _module: guard,
            }),
        );
        report.loaded.push(name);
    }
}

// =============================================================================
// LoadReport
// =============================================================================

/// Outcome of one load: what registered and what went wrong.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the extensions registered, in order.
    pub loaded: Vec<String>,
    /// Module failures and registration conflicts, in the order found.
    pub faults: Vec<RegistrationError>,
}

impl LoadReport {
    /// Returns `true` if nothing went wrong.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// Names that were shadowed by an earlier registration.
    pub fn collisions(&self) -> impl Iterator<Item = &RegistrationError> {
        self.faults.iter().filter(|fault| fault.is_collision())
    }

    pub fn extend(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.faults.extend(other.faults);
    }

    fn fault(&mut self, fault: RegistrationError) {
        if fault.is_collision() {
            warn!(error = %fault, "Command name collision, later registration is unreachable");
        } else {
            error!(error = %fault, "Extension registration fault");
        }
        self.faults.push(fault);
    }
}

// =============================================================================
// ExtensionRegistry
// =============================================================================

/// Discovers, initialises and registers extensions.
pub struct ExtensionRegistry {
    loader: Arc<dyn ModuleLoader>,
    tables: RwLock<Arc<DispatchTables>>,
    /// Built-ins survive reloads; they are re-initialised each time.
    registration: tokio::sync::Mutex<Vec<InitFn>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.snapshot();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &tables.extensions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ExtensionRegistry {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            tables: RwLock::new(Arc::new(DispatchTables::default())),
            registration: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// The currently published tables.
    pub fn snapshot(&self) -> Arc<DispatchTables> {
        Arc::clone(&self.tables.read())
    }

    /// Registers a built-in extension.  It is initialised now and again on
    /// every reload.
    pub async fn register_builtin(&self, init: InitFn, ctx: &InitContext) -> LoadReport {
        let mut builtins = self.registration.lock().await;
        builtins.push(init);

        let mut report = LoadReport::default();
        self.register(init, ExtensionOrigin::Builtin, None, ctx, &mut report);
        report
    }

    /// Loads every module in `dir`.  A missing directory loads nothing.
    pub async fn load_all(&self, dir: &Path, ctx: &InitContext) -> LoadReport {
        let _guard = self.registration.lock().await;
        let mut report = LoadReport::default();
        self.load_dir(dir, ctx, &mut report).await;
        report
    }

    /// Clears every table, then registers built-ins and `dir`'s modules again.
    pub async fn reload_all(&self, dir: Option<&Path>, ctx: &InitContext) -> LoadReport {
        let builtins = self.registration.lock().await;

        // Cached blobs may be instances of types defined in modules about to
        // be unmapped.
        ctx.configs().clear();
        *self.tables.write() = Arc::new(DispatchTables::default());
        info!("Dispatch tables cleared for reload");

        let mut report = LoadReport::default();
        for &init in builtins.iter() {
            self.register(init, ExtensionOrigin::Builtin, None, ctx, &mut report);
        }
        if let Some(dir) = dir {
            self.load_dir(dir, ctx, &mut report).await;
        }

        info!(
            loaded = report.loaded.len(),
            faults = report.faults.len(),
            "Extensions reloaded"
        );
        report
    }

    /// The typed configuration `extension` attached to its descriptor.
    pub fn extension_config<T: Send + Sync + 'static>(&self, extension: &str) -> Option<Arc<T>> {
        self.snapshot().extension(extension)?.config()
    }

    // ─── Internals (registration lock held) ─────────────────────────────────

    async fn load_dir(&self, dir: &Path, ctx: &InitContext, report: &mut LoadReport) {
        let candidates = match self.candidates(dir).await {
            Ok(candidates) => candidates,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "Extension directory not found, no modules loaded");
                return;
            }
            Err(e) => {
                report.fault(RegistrationError::Open {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        debug!(dir = %dir.display(), candidates = candidates.len(), "Scanning extension directory");

        for path in candidates {
            let module = match self.loader.open(&path) {
                Ok(module) => module,
                Err(e) => {
                    report.fault(e);
                    continue;
                }
            };
            let module_ctx = ctx.for_module(&path);
            self.register(
                module.init,
                ExtensionOrigin::Module(path),
                module.guard,
                &module_ctx,
                report,
            );
        }
    }

    async fn candidates(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.loader.is_candidate(&path) && entry.file_type().await?.is_file() {
                candidates.push(path);
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    fn register(
        &self,
        init: InitFn,
        origin: ExtensionOrigin,
        guard: Option<ModuleGuard>,
        ctx: &InitContext,
        report: &mut LoadReport,
    ) {
        let label = match &origin {
            ExtensionOrigin::Builtin => "built-in".to_string(),
            ExtensionOrigin::Module(path) => path.display().to_string(),
        };

        let descriptor = match catch_unwind(AssertUnwindSafe(|| init(ctx))) {
            Ok(Ok(descriptor)) => descriptor,
            Ok(Err(e)) => {
                report.fault(RegistrationError::Init {
                    origin: label,
                    reason: e.to_string(),
                });
                return;
            }
            Err(panic) => {
                report.fault(RegistrationError::Init {
                    origin: label,
                    reason: panic_message(panic.as_ref()),
                });
                return;
            }
        };

        let mut next = DispatchTables::clone(&self.snapshot());
        next.merge(descriptor, origin, guard, report);
        *self.tables.write() = Arc::new(next);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitContext;
    use crate::error::BoxError;
    use crate::extension::{CatalogLoader, ExtensionConfigStore};
    use guildkit_core::{ChannelId, GuildId, MemberEvent, MessageId, ReactionEvent};

    fn ctx(dir: &Path) -> InitContext {
        InitContext::new(Arc::new(ExtensionConfigStore::new(dir)), UserId(999))
    }

    fn message(content: &str) -> MessageEvent {
        MessageEvent {
            id: MessageId(1),
            guild_id: Some(GuildId(1)),
            channel_id: ChannelId(10),
            author_id: UserId(20),
            author_is_bot: false,
            content: content.into(),
        }
    }

    fn noop() -> CommandDescriptor {
        CommandDescriptor::new("noop", |_| async { Ok(()) })
    }

    fn alpha(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("alpha", "1.0.0")
            .command(CommandDescriptor::new("Roll", |_| async { Ok(()) }).alias("dice")))
    }

    fn beta(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("beta", "1.0.0")
            .command(CommandDescriptor::new("dice", |_| async { Ok(()) }).alias("toss")))
    }

    fn failing(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Err("database unreachable".into())
    }

    fn panicking(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        panic!("boom")
    }

    fn bad_pattern(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("bad-pattern", "1.0.0")
            .command(noop())
            .response(ResponseDescriptor::new("broken", ["(unclosed"], |_| async {}))
            .response(ResponseDescriptor::new("fine", ["ok"], |_| async {})))
    }

    fn mismatched(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("mismatched", "1.0.0")
            .handler(RawHandlerDescriptor::new::<MemberEvent, _, _>(
                "wrong",
                EventKind::ReactionAdded,
                |_| async {},
            ))
            .handler(RawHandlerDescriptor::new::<ReactionEvent, _, _>(
                "right",
                EventKind::ReactionAdded,
                |_| async {},
            )))
    }

    fn touch(dir: &Path, stem: &str) {
        let file = format!("{stem}.{}", std::env::consts::DLL_EXTENSION);
        std::fs::write(dir.join(file), b"").unwrap();
    }

    #[test]
    fn test_threshold_semantics() {
        let patterns: Vec<Regex> = ["a", "b", "c"].iter().map(|p| Regex::new(p).unwrap()).collect();

        assert!(threshold_met(&patterns, "a b", 2));
        assert!(threshold_met(&patterns, "c a", 2));
        assert!(!threshold_met(&patterns, "only a", 2));
        assert!(!threshold_met(&patterns, "xyz", 1));
        assert!(!threshold_met(&patterns, "abc", 4));

        // Zero and negative thresholds are satisfied before any pattern.
        assert!(threshold_met(&patterns, "xyz", 0));
        assert!(threshold_met(&patterns, "xyz", -3));
        assert!(threshold_met(&[], "", 0));
    }

    #[test]
    fn test_threshold_single_match_is_not_enough() {
        let patterns: Vec<Regex> = ["apple", "banana", "cherry"]
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect();
        assert!(!threshold_met(&patterns, "an apple a day", 2));
        assert!(threshold_met(&patterns, "apple and cherry", 2));
    }

    #[test]
    fn test_placeholder_substitution_and_memo() {
        let mut tables = DispatchTables::default();
        let mut report = LoadReport::default();
        tables.merge(
            ExtensionDescriptor::new("mentions", "1.0.0").response(
                ResponseDescriptor::new("hello", ["<@!?BOT_ID>", "(?i)hello"], |_| async {}).match_min(2),
            ),
            ExtensionOrigin::Builtin,
            None,
            &mut report,
        );
        assert!(report.is_clean());

        let entry = &tables.responses()[0];
        assert!(entry.should_fire(&message("<@999> hello"), UserId(999)));
        assert!(entry.should_fire(&message("HELLO <@!999>"), UserId(999)));
        assert!(!entry.should_fire(&message("<@999>"), UserId(999)));
        assert!(!entry.should_fire(&message("<@998> hello"), UserId(999)));

        let first = entry.regexes(UserId(999));
        assert!(Arc::ptr_eq(&first, &entry.regexes(UserId(999))));
        assert!(!Arc::ptr_eq(&first, &entry.regexes(UserId(5))));
    }

    #[test]
    fn test_allow_lists() {
        let mut tables = DispatchTables::default();
        let mut report = LoadReport::default();
        tables.merge(
            ExtensionDescriptor::new("lists", "1.0.0")
                .response(ResponseDescriptor::new("by-channel", ["x"], |_| async {}).channels([ChannelId(10)]))
                .response(ResponseDescriptor::new("by-user", ["x"], |_| async {}).users([UserId(21)])),
            ExtensionOrigin::Builtin,
            None,
            &mut report,
        );

        let [by_channel, by_user] = tables.responses() else {
            panic!("expected two responses");
        };

        let mut event = message("x marks the spot");
        assert!(by_channel.should_fire(&event, UserId(999)));
        assert!(!by_user.should_fire(&event, UserId(999)));

        event.channel_id = ChannelId(11);
        event.author_id = UserId(21);
        assert!(!by_channel.should_fire(&event, UserId(999)));
        assert!(by_user.should_fire(&event, UserId(999)));

        // Allow-listed but not matching.
        event.content = "nothing here".into();
        assert!(!by_user.should_fire(&event, UserId(999)));
    }

    #[tokio::test]
    async fn test_collision_first_registrant_wins() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExtensionRegistry::new(Arc::new(CatalogLoader::new()));
        let ctx = ctx(dir.path());

        assert!(registry.register_builtin(alpha, &ctx).await.is_clean());
        let report = registry.register_builtin(beta, &ctx).await;

        // `beta` still registers, but its canonical name is shadowed.
        assert_eq!(report.loaded, vec!["beta"]);
        let collisions: Vec<_> = report.collisions().collect();
        assert_eq!(collisions.len(), 1);
        assert!(matches!(
            collisions[0],
            RegistrationError::NameCollision { name, owner, .. } if name == "dice" && owner == "roll"
        ));

        let tables = registry.snapshot();
        assert_eq!(&*tables.command("DICE").unwrap().extension, "alpha");
        assert_eq!(&*tables.command("roll").unwrap().extension, "alpha");
        // The non-colliding alias still reaches the later command.
        assert_eq!(&*tables.command("toss").unwrap().extension, "beta");
        // Only the reachable canonical names are listed.
        let listed: Vec<_> = tables.commands().map(|c| c.descriptor.name.as_str()).collect();
        assert_eq!(listed, vec!["roll"]);
    }

    fn self_alias(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
        Ok(ExtensionDescriptor::new("self-alias", "1.0.0").command(
            CommandDescriptor::new("Flip", |_| async { Ok(()) })
                .alias("flip")
                .alias("coin")
                .alias("COIN"),
        ))
    }

    #[tokio::test]
    async fn test_command_repeating_its_own_names_registers() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExtensionRegistry::new(Arc::new(CatalogLoader::new()));
        let ctx = ctx(dir.path());

        let report = registry.register_builtin(self_alias, &ctx).await;
        assert!(report.is_clean());
        assert_eq!(report.loaded, vec!["self-alias"]);

        // Later extensions still register normally.
        assert!(registry.register_builtin(alpha, &ctx).await.is_clean());

        let tables = registry.snapshot();
        assert_eq!(&*tables.command("flip").unwrap().extension, "self-alias");
        assert_eq!(&*tables.command("coin").unwrap().extension, "self-alias");
        assert_eq!(&*tables.command("roll").unwrap().extension, "alpha");
        let listed: Vec<_> = tables.commands().map(|c| c.descriptor.name.as_str()).collect();
        assert_eq!(listed, vec!["flip", "roll"]);
    }

    #[tokio::test]
    async fn test_duplicate_extension_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExtensionRegistry::new(Arc::new(CatalogLoader::new()));
        let ctx = ctx(dir.path());

        registry.register_builtin(alpha, &ctx).await;
        let report = registry.register_builtin(alpha, &ctx).await;

        assert!(report.loaded.is_empty());
        assert!(matches!(report.faults[0], RegistrationError::DuplicateExtension(ref n) if n == "alpha"));
        assert_eq!(registry.snapshot().extensions().count(), 1);
    }

    #[tokio::test]
    async fn test_failing_modules_do_not_abort_loading() {
        let dir = tempfile::tempdir().unwrap();
        let loader = CatalogLoader::new()
            .with("a_alpha", alpha)
            .with("b_failing", failing)
            .with("c_panicking", panicking)
            .with("e_beta", beta);
        touch(dir.path(), "a_alpha");
        touch(dir.path(), "b_failing");
        touch(dir.path(), "c_panicking");
        touch(dir.path(), "d_unknown");
        touch(dir.path(), "e_beta");
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let registry = ExtensionRegistry::new(Arc::new(loader));
        let report = registry.load_all(dir.path(), &ctx(dir.path())).await;

        assert_eq!(report.loaded, vec!["alpha", "beta"]);
        let kinds: Vec<_> = report
            .faults
            .iter()
            .map(|f| match f {
                RegistrationError::Init { reason, .. } if reason.contains("boom") => "panic",
                RegistrationError::Init { .. } => "init",
                RegistrationError::MissingSymbol { .. } => "symbol",
                RegistrationError::NameCollision { .. } => "collision",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["init", "panic", "symbol", "collision"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExtensionRegistry::new(Arc::new(CatalogLoader::new()));
        registry.register_builtin(alpha, &ctx(dir.path())).await;

        let report = registry
            .load_all(&dir.path().join("does-not-exist"), &ctx(dir.path()))
            .await;

        assert!(report.is_clean());
        assert!(report.loaded.is_empty());
        assert!(registry.snapshot().command("roll").is_some());
    }

    #[tokio::test]
    async fn test_invalid_pattern_and_payload_mismatch_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExtensionRegistry::new(Arc::new(CatalogLoader::new()));
        let ctx = ctx(dir.path());

        let report = registry.register_builtin(bad_pattern, &ctx).await;
        assert!(matches!(report.faults[..], [RegistrationError::InvalidPattern { .. }]));

        let report = registry.register_builtin(mismatched, &ctx).await;
        assert!(matches!(
            report.faults[..],
            [RegistrationError::PayloadMismatch { kind: EventKind::ReactionAdded, .. }]
        ));

        let tables = registry.snapshot();
        assert_eq!(tables.responses().len(), 1);
        assert_eq!(tables.responses()[0].descriptor.name, "fine");
        assert_eq!(tables.handlers_for(EventKind::ReactionAdded).len(), 1);
        assert!(tables.handlers_for(EventKind::MemberJoined).is_empty());
    }

    #[tokio::test]
    async fn test_reload_drops_removed_modules_and_keeps_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(CatalogLoader::new().with("beta", beta));
        touch(dir.path(), "beta");

        let registry = ExtensionRegistry::new(loader.clone());
        let ctx = ctx(dir.path());
        registry.register_builtin(alpha, &ctx).await;
        registry.load_all(dir.path(), &ctx).await;
        assert!(registry.snapshot().command("toss").is_some());

        let before = registry.snapshot();
        std::fs::remove_file(dir.path().join(format!("beta.{}", std::env::consts::DLL_EXTENSION))).unwrap();
        let report = registry.reload_all(Some(dir.path()), &ctx).await;

        assert_eq!(report.loaded, vec!["alpha"]);
        let after = registry.snapshot();
        assert!(after.command("roll").is_some());
        assert!(after.command("toss").is_none());
        // A snapshot taken before the reload is unaffected.
        assert!(before.command("toss").is_some());
    }
}
