//! Extension descriptors: what a module hands back from its init entry point.
//!
//! Entry points are stored as type-erased closures returning boxed futures.
//! The builders accept any `async` closure of the right shape:
//!
//! ```rust,ignore
//! let ping = CommandDescriptor::new("ping", |ctx: CommandContext| async move {
//!     ctx.reply("Pong!").await?;
//!     Ok(())
//! })
//! .alias("latency")
//! .description("Checks that the bot is alive");
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use guildkit_core::{ChannelId, EventKind, UserId};

use crate::context::{BotCore, CommandContext, JobContext, RawContext, ResponseContext};
use crate::error::CommandResult;

/// Substituted with the bot's own user id before a response pattern is
/// compiled.  `"<@!?BOT_ID>"` matches a mention of the bot.
pub const SELF_ID_PLACEHOLDER: &str = "BOT_ID";

pub type CommandFn = Arc<dyn Fn(CommandContext) -> BoxFuture<'static, CommandResult> + Send + Sync>;
pub type ResponseFn = Arc<dyn Fn(ResponseContext) -> BoxFuture<'static, ()> + Send + Sync>;
pub type JobFn = Arc<dyn Fn(JobContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Erased raw handler.  Returns `None` when the payload is not the expected
/// type.
pub(crate) type RawFn = Arc<
    dyn Fn(Arc<BotCore>, EventKind, Arc<dyn Any + Send + Sync>) -> Option<BoxFuture<'static, ()>>
        + Send
        + Sync,
>;

// ─── CommandDescriptor ───────────────────────────────────────────────────────

/// A prefix command.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Canonical name, lower-case.
    pub name: String,
    /// Alternative names, lower-case.
    pub aliases: Vec<String>,
    pub description: String,
    /// Argument synopsis shown by `help`, e.g. `"[new prefix]"`.
    pub usage: String,
    /// Rejects invocation from direct messages.
    pub guild_only: bool,
    pub handler: CommandFn,
}

impl CommandDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            description: String::new(),
            usage: String::new(),
            guild_only: false,
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("guild_only", &self.guild_only)
            .finish_non_exhaustive()
    }
}

// ─── ResponseDescriptor ──────────────────────────────────────────────────────

/// An auto-response fired when enough of its patterns match a message.
#[derive(Clone)]
pub struct ResponseDescriptor {
    pub name: String,
    /// Independent regular expressions, evaluated in order.
    pub patterns: Vec<String>,
    /// Matches required before the response fires.  Zero or negative always
    /// fires.
    pub match_min: i32,
    /// Empty means every channel.
    pub channels: Vec<ChannelId>,
    /// Empty means every author.
    pub users: Vec<UserId>,
    pub handler: ResponseFn,
}

impl ResponseDescriptor {
    /// Creates a response that fires when any single pattern matches.
    pub fn new<I, S, F, Fut>(name: impl Into<String>, patterns: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResponseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            match_min: 1,
            channels: Vec::new(),
            users: Vec::new(),
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    pub fn match_min(mut self, match_min: i32) -> Self {
        self.match_min = match_min;
        self
    }

    pub fn channels(mut self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
        self.channels = channels.into_iter().collect();
        self
    }

    pub fn users(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.users = users.into_iter().collect();
        self
    }
}

impl fmt::Debug for ResponseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDescriptor")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("match_min", &self.match_min)
            .field("channels", &self.channels)
            .field("users", &self.users)
            .finish_non_exhaustive()
    }
}

// ─── JobDescriptor ───────────────────────────────────────────────────────────

/// Work run on a fixed interval while the extension is registered.
#[derive(Clone)]
pub struct JobDescriptor {
    pub name: String,
    pub interval: Duration,
    pub run: JobFn,
}

impl JobDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, run: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            interval,
            run: Arc::new(move |ctx| run(ctx).boxed()),
        }
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

// ─── RawHandlerDescriptor ────────────────────────────────────────────────────

/// A handler for every inbound event of one [`EventKind`].
#[derive(Clone)]
pub struct RawHandlerDescriptor {
    pub name: String,
    pub kind: EventKind,
    /// Payload type the handler was declared with.
    pub expected: TypeId,
    pub expected_name: &'static str,
    pub(crate) invoke: RawFn,
}

impl RawHandlerDescriptor {
    /// Declares a handler receiving payloads of type `T`.
    ///
    /// `T` is checked against [`EventKind::payload_type`] when the extension
    /// is registered.
    pub fn new<T, F, Fut>(name: impl Into<String>, kind: EventKind, handler: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(RawContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let invoke: RawFn = Arc::new(
            move |core: Arc<BotCore>, kind: EventKind, payload: Arc<dyn Any + Send + Sync>| {
                let payload = payload.downcast::<T>().ok()?;
                Some(
                    handler(RawContext {
                        core,
                        kind,
                        payload,
                    })
                    .boxed(),
                )
            },
        );

        Self {
            name: name.into(),
            kind,
            expected: TypeId::of::<T>(),
            expected_name: std::any::type_name::<T>(),
            invoke,
        }
    }

    /// Returns `true` if the declared payload matches what `kind` carries.
    pub fn accepts_kind(&self) -> bool {
        self.expected == self.kind.payload_type()
    }
}

impl fmt::Debug for RawHandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("expected", &self.expected_name)
            .finish_non_exhaustive()
    }
}

// ─── ExtensionDescriptor ─────────────────────────────────────────────────────

/// Everything one extension contributes.
#[derive(Clone, Default)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub description: String,
    /// Semantic version string, informational.
    pub version: String,
    pub commands: Vec<CommandDescriptor>,
    pub responses: Vec<ResponseDescriptor>,
    pub jobs: Vec<JobDescriptor>,
    pub handlers: Vec<RawHandlerDescriptor>,
    /// Typed configuration the extension loaded during init.
    pub config: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn command(mut self, command: CommandDescriptor) -> Self {
        self.commands.push(command);
        self
    }

    pub fn response(mut self, response: ResponseDescriptor) -> Self {
        self.responses.push(response);
        self
    }

    pub fn job(mut self, job: JobDescriptor) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn handler(mut self, handler: RawHandlerDescriptor) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Attaches the extension's typed configuration.
    pub fn config<T: Any + Send + Sync>(mut self, config: Arc<T>) -> Self {
        self.config = Some(config);
        self
    }
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("commands", &self.commands)
            .field("responses", &self.responses)
            .field("jobs", &self.jobs)
            .field("handlers", &self.handlers)
            .field("config", &self.config.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildkit_core::{MemberEvent, MessageEvent};

    #[test]
    fn test_names_are_case_folded() {
        let command = CommandDescriptor::new("Ping", |_| async { Ok(()) })
            .alias("LATENCY")
            .alias("pong");
        let names: Vec<_> = command.names().collect();
        assert_eq!(names, vec!["ping", "latency", "pong"]);
    }

    #[test]
    fn test_response_defaults() {
        let response = ResponseDescriptor::new("hi", ["hello", "hey"], |_| async {});
        assert_eq!(response.match_min, 1);
        assert!(response.channels.is_empty());
        assert!(response.users.is_empty());
        assert_eq!(response.patterns.len(), 2);
    }

    #[test]
    fn test_raw_handler_shape() {
        let good = RawHandlerDescriptor::new::<MemberEvent, _, _>(
            "welcome",
            EventKind::MemberJoined,
            |_| async {},
        );
        assert!(good.accepts_kind());

        let bad = RawHandlerDescriptor::new::<MessageEvent, _, _>(
            "confused",
            EventKind::ReactionAdded,
            |_| async {},
        );
        assert!(!bad.accepts_kind());
        assert!(bad.expected_name.ends_with("MessageEvent"));
    }
}
