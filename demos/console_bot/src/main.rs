//! Console Bot Example
//!
//! Runs a full guildkit runtime with the terminal standing in for the
//! gateway.  Every line typed becomes a message in one community; lines
//! starting with `@dm ` arrive as direct messages instead.  Replies are
//! printed to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --create-if-missing
//! > .help
//! > .prefix !
//! > !ping
//! > @dm !ping
//! ```
//!
//! Loadable modules (see `demos/dice_extension`) are picked up from the
//! configured extension directory; `.reload` rescans it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use guildkit::core::{ApiResult, ChannelId, Embed, GuildId, MessageHandle, MessageId, Messenger, UserId};
use guildkit::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Drive a guildkit bot from the terminal")]
struct Cli {
    /// Configuration file; searched for in the usual places when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Community the typed messages belong to.
    #[arg(long, default_value_t = 1)]
    guild: u64,

    /// User the typed messages come from.
    #[arg(long, default_value_t = 100)]
    user: u64,

    /// The bot's own user id, for mentions like `<@1>`.
    #[arg(long, default_value_t = 1)]
    bot_id: u64,

    /// Start from an empty store if the snapshot does not exist yet.
    #[arg(long)]
    create_if_missing: bool,
}

// ============================================================================
// Messenger
// ============================================================================

/// Prints outbound messages instead of sending them anywhere.
struct ConsoleMessenger {
    self_id: UserId,
    next_id: AtomicU64,
}

impl ConsoleMessenger {
    fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            next_id: AtomicU64::new(1),
        }
    }

    fn handle(&self, channel: ChannelId) -> MessageHandle {
        MessageHandle::new(channel, MessageId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    fn self_id(&self) -> UserId {
        self.self_id
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> ApiResult<MessageHandle> {
        println!("[#{channel}] {text}");
        Ok(self.handle(channel))
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> ApiResult<MessageHandle> {
        println!("[#{channel}] ┌ {}", embed.title);
        if !embed.description.is_empty() {
            println!("[#{channel}] │ {}", embed.description);
        }
        for field in &embed.fields {
            println!("[#{channel}] │ {}: {}", field.name, field.value);
        }
        Ok(self.handle(channel))
    }

    async fn edit_message(&self, message: MessageHandle, text: &str) -> ApiResult<()> {
        println!("[#{} edit {}] {text}", message.channel_id, message.message_id);
        Ok(())
    }

    async fn react(&self, message: MessageHandle, emoji: &str) -> ApiResult<()> {
        println!("[#{} react {}] {emoji}", message.channel_id, message.message_id);
        Ok(())
    }

    async fn list_reactors(&self, _message: MessageHandle, _emoji: &str) -> ApiResult<Vec<UserId>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Built-in extension
// ============================================================================

fn console_extension(_: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
    Ok(ExtensionDescriptor::new("console", env!("CARGO_PKG_VERSION"))
        .description("Extras for the terminal demo")
        .command(
            CommandDescriptor::new("echo", |ctx: CommandContext| async move {
                let text = ctx
                    .args
                    .rest_from(1)
                    .ok_or_else(|| CommandError::syntax("nothing to echo"))?;
                ctx.reply(&text).await?;
                Ok(())
            })
            .alias("say")
            .usage("<text>")
            .description("Repeats the text back"),
        )
        .response(ResponseDescriptor::new(
            "thanks",
            [r"(?i)\bthank(s| you)\b"],
            |ctx: ResponseContext| async move {
                let _ = ctx.reply("Any time!").await;
            },
        ))
        .job(JobDescriptor::new(
            "census",
            Duration::from_secs(60),
            |ctx: JobContext| async move {
                info!(guilds = ctx.core.store().len(), "census");
            },
        )))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = GuildkitRuntime::builder()
        .messenger(Arc::new(ConsoleMessenger::new(UserId(cli.bot_id))))
        .builtin(console_extension)
        .create_if_missing(cli.create_if_missing);
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build().await?;

    let guild = GuildId(cli.guild);
    let author = UserId(cli.user);
    let mut next_id = 0u64;

    let read_lines = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            next_id += 1;
            let (guild_id, content) = match line.strip_prefix("@dm ") {
                Some(rest) => (None, rest.to_string()),
                None => (Some(guild), line),
            };
            let event = MessageEvent {
                id: MessageId(next_id),
                guild_id,
                channel_id: ChannelId(guild_id.map_or(0, |g| g.get())),
                author_id: author,
                author_is_bot: false,
                content,
            };
            if let Some(task) = runtime.handle_event(event.into()) {
                // One line at a time keeps the transcript readable.
                let _ = task.await;
            }
        }
    };

    runtime
        .run_until(async {
            tokio::select! {
                _ = read_lines => info!("stdin closed"),
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
            }
        })
        .await?;

    Ok(())
}
