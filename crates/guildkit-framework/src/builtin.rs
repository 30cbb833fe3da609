//! The built-in `core` extension.
//!
//! Registered by the runtime before any module is loaded, and registered
//! again on every reload.
//!
//! | Command | Aliases | Notes |
//! |---------|---------|-------|
//! | `ping` | `latency` | |
//! | `prefix [new]` | | server only; changing needs `manage-prefix` |
//! | `help [command]` | `commands` | |
//! | `permit grant\|revoke\|list <group> [@user]` | | server only; changes need `manage-permissions` |
//! | `reload` | | operator only |
//!
//! The `prefix-hint` response answers a mention of the bot that also says
//! "prefix" with the prefix in effect.

use tracing::warn;

use guildkit_core::{Embed, mentions_user};

use crate::context::{CommandContext, InitContext, ResponseContext};
use crate::error::{BoxError, CommandError, CommandResult};
use crate::extension::{CommandDescriptor, ExtensionDescriptor, FRAMEWORK_VERSION, ResponseDescriptor};
use crate::permission::{MANAGE_PERMISSIONS, MANAGE_PREFIX, require_operator, require_permission};

/// Name the built-in extension registers under.
pub const CORE_EXTENSION: &str = "core";

/// Longest prefix `prefix` accepts, in characters.
pub const MAX_PREFIX_LEN: usize = 8;

/// Init entry point of the built-in extension.
pub fn core_extension(_ctx: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
    Ok(ExtensionDescriptor::new(CORE_EXTENSION, FRAMEWORK_VERSION)
        .description("Built-in commands")
        .command(
            CommandDescriptor::new("ping", ping)
                .alias("latency")
                .description("Checks that the bot is responding"),
        )
        .command(
            CommandDescriptor::new("prefix", prefix)
                .usage("[new prefix]")
                .description("Shows or changes the command prefix for this server")
                .guild_only(),
        )
        .command(
            CommandDescriptor::new("help", help)
                .alias("commands")
                .usage("[command]")
                .description("Lists commands, or describes one"),
        )
        .command(
            CommandDescriptor::new("permit", permit)
                .usage("<grant|revoke|list> <group> [@user]")
                .description("Manages permission groups for this server")
                .guild_only(),
        )
        .command(CommandDescriptor::new("reload", reload).description("Reloads every extension"))
        .response(
            ResponseDescriptor::new("prefix-hint", ["<@!?BOT_ID>", r"(?i)\bprefix\b"], prefix_hint)
                .match_min(2),
        ))
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn ping(ctx: CommandContext) -> CommandResult {
    ctx.reply("Pong!").await?;
    Ok(())
}

async fn prefix(ctx: CommandContext) -> CommandResult {
    let guild = ctx.require_guild()?;

    let Some(new_prefix) = ctx.args.optional(1) else {
        let current = ctx.store().with_guild(guild, "show-prefix", |r| r.prefix.clone());
        ctx.reply(&format!("The prefix here is `{current}`")).await?;
        return Ok(());
    };

    require_permission(&ctx, MANAGE_PREFIX)?;
    if ctx.args.len() > 1 {
        return Err(CommandError::syntax("the prefix cannot contain spaces"));
    }
    if new_prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(CommandError::syntax(format!(
            "the prefix can be at most {MAX_PREFIX_LEN} characters"
        )));
    }

    ctx.store()
        .with_guild(guild, "set-prefix", |r| r.prefix = new_prefix.to_string());
    ctx.reply(&format!("Prefix set to `{new_prefix}`")).await?;
    Ok(())
}

async fn help(ctx: CommandContext) -> CommandResult {
    let tables = ctx.core.registry().snapshot();
    let prefix = match ctx.guild_id() {
        Some(guild) => ctx
            .store()
            .cached_prefix(guild)
            .unwrap_or_else(|| ctx.store().default_prefix().to_string()),
        None => String::new(),
    };

    let embed = match ctx.args.optional(1) {
        Some(name) => {
            let entry = tables
                .command(name)
                .ok_or_else(|| CommandError::syntax(format!("there is no command named `{name}`")))?;
            let command = &entry.descriptor;

            let title = format!("{prefix}{} {}", command.name, command.usage);
            let mut embed = Embed::new(title.trim_end())
                .description(describe(&command.description))
                .color(Embed::INFO_COLOR);
            if !command.aliases.is_empty() {
                embed = embed.field("Aliases", command.aliases.join(", "), true);
            }
            if command.guild_only {
                embed = embed.field("Availability", "Servers only", true);
            }
            embed.field("Extension", entry.extension.to_string(), true)
        }
        None => tables.commands().fold(
            Embed::new("Commands").color(Embed::INFO_COLOR),
            |embed, entry| {
                embed.field(
                    format!("{prefix}{}", entry.descriptor.name),
                    describe(&entry.descriptor.description),
                    false,
                )
            },
        ),
    };

    ctx.reply_embed(&embed).await?;
    Ok(())
}

async fn permit(ctx: CommandContext) -> CommandResult {
    let guild = ctx.require_guild()?;
    let action = ctx.args.arg(1, "grant, revoke or list")?.to_lowercase();
    let group = ctx.args.arg(2, "a permission group")?.to_lowercase();

    match action.as_str() {
        "list" => {
            let members = ctx.store().read_guild(guild, "permit-list", |record| {
                record
                    .and_then(|r| r.members(&group))
                    .map(|members| members.iter().map(|id| format!("<@{id}>")).collect::<Vec<_>>())
                    .unwrap_or_default()
            });
            let text = if members.is_empty() {
                format!("Nobody holds `{group}`, so it is open to everyone")
            } else {
                format!("`{group}`: {}", members.join(", "))
            };
            ctx.reply(&text).await?;
        }
        "grant" | "revoke" => {
            require_permission(&ctx, MANAGE_PERMISSIONS)?;
            let user = ctx.args.user(3)?;
            let granting = action == "grant";

            let changed = ctx.store().with_guild(guild, "permit", |r| {
                if granting {
                    r.grant(&group, user)
                } else {
                    r.revoke(&group, user)
                }
            });

            let text = match (granting, changed) {
                (true, true) => format!("Granted `{group}` to <@{user}>"),
                (true, false) => format!("<@{user}> already has `{group}`"),
                (false, true) => format!("Revoked `{group}` from <@{user}>"),
                (false, false) => format!("<@{user}> does not have `{group}`"),
            };
            ctx.reply(&text).await?;
        }
        other => {
            return Err(CommandError::syntax(format!(
                "unknown action `{other}`, expected grant, revoke or list"
            )));
        }
    }
    Ok(())
}

async fn reload(ctx: CommandContext) -> CommandResult {
    require_operator(&ctx)?;

    let report = ctx.core.reload_extensions().await;
    let color = if report.is_clean() {
        Embed::INFO_COLOR
    } else {
        Embed::ERROR_COLOR
    };
    let embed = report.faults.iter().take(10).fold(
        Embed::new("Extensions reloaded")
            .description(format!(
                "{} loaded, {} problem(s)",
                report.loaded.len(),
                report.faults.len()
            ))
            .color(color),
        |embed, fault| embed.field("Problem", fault.to_string(), false),
    );

    ctx.reply_embed(&embed).await?;
    Ok(())
}

fn describe(description: &str) -> String {
    if description.is_empty() {
        "No description".to_string()
    } else {
        description.to_string()
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

async fn prefix_hint(ctx: ResponseContext) {
    // The pattern already matched; this guards against a stale compiled id.
    if !mentions_user(&ctx.event.content, ctx.core.self_id()) {
        return;
    }

    let store = ctx.core.store();
    let text = match ctx.event.guild_id {
        Some(guild) => {
            let prefix = store
                .cached_prefix(guild)
                .unwrap_or_else(|| store.default_prefix().to_string());
            format!("My prefix here is `{prefix}`. Try `{prefix}help`.")
        }
        None => "No prefix is needed in direct messages. Try `help`.".to_string(),
    };

    if let Err(e) = ctx.reply(&text).await {
        warn!(error = %e, "Failed to send prefix hint");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use guildkit_core::testing::RecordingMessenger;
    use guildkit_core::{ChannelId, GuildId, MessageEvent, MessageId, UserId};

    use super::*;
    use crate::context::BotCore;
    use crate::dispatch::{DispatchOutcome, dispatch_command, run_responses};
    use crate::extension::CatalogLoader;
    use crate::store::GuildStore;

    const BOT: UserId = UserId(999);
    const OPERATOR: UserId = UserId(1);
    const G: GuildId = GuildId(50);

    async fn core() -> (Arc<BotCore>, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new(BOT));
        let core = BotCore::builder(
            GuildStore::new(".").with_operator_fallback(Some(OPERATOR)),
            messenger.clone(),
        )
        .loader(Arc::new(CatalogLoader::new()))
        .build();
        assert!(core.register_builtin(core_extension).await.is_clean());
        (core, messenger)
    }

    fn message(guild: Option<GuildId>, author: UserId, content: &str) -> Arc<MessageEvent> {
        Arc::new(MessageEvent {
            id: MessageId(1),
            guild_id: guild,
            channel_id: ChannelId(10),
            author_id: author,
            author_is_bot: false,
            content: content.into(),
        })
    }

    async fn run(core: &Arc<BotCore>, author: UserId, content: &str) -> DispatchOutcome {
        dispatch_command(core, message(Some(G), author, content)).await
    }

    #[tokio::test]
    async fn test_ping_and_alias() {
        let (core, messenger) = core().await;
        assert!(run(&core, UserId(5), ".ping").await.is_completed());
        assert!(run(&core, UserId(5), ".LATENCY").await.is_completed());
        assert_eq!(messenger.texts(), vec!["Pong!", "Pong!"]);
    }

    #[tokio::test]
    async fn test_prefix_show_and_validate() {
        let (core, messenger) = core().await;

        assert!(run(&core, UserId(5), ".prefix").await.is_completed());
        assert_eq!(messenger.texts(), vec!["The prefix here is `.`"]);

        let outcome = run(&core, UserId(5), ".prefix ! ?").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { error: CommandError::Syntax(_), .. }));
        let outcome = run(&core, UserId(5), ".prefix waytoolongprefix").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { error: CommandError::Syntax(_), .. }));
        assert_eq!(core.store().cached_prefix(G).as_deref(), Some("."));
    }

    #[tokio::test]
    async fn test_prefix_change_requires_permission_once_granted() {
        let (core, _) = core().await;
        assert!(run(&core, OPERATOR, ".permit grant manage-prefix <@7>").await.is_completed());

        let outcome = run(&core, UserId(5), ".prefix !").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { error: CommandError::Permission(_), .. }));

        assert!(run(&core, UserId(7), ".prefix !").await.is_completed());
        assert_eq!(core.store().cached_prefix(G).as_deref(), Some("!"));
    }

    #[tokio::test]
    async fn test_permit_list_and_revoke() {
        let (core, messenger) = core().await;
        run(&core, OPERATOR, ".permit grant mods <@7>").await;
        run(&core, OPERATOR, ".permit list mods").await;
        run(&core, OPERATOR, ".permit revoke mods <@!7>").await;
        run(&core, OPERATOR, ".permit list mods").await;

        assert_eq!(
            messenger.texts(),
            vec![
                "Granted `mods` to <@7>",
                "`mods`: <@7>",
                "Revoked `mods` from <@7>",
                "Nobody holds `mods`, so it is open to everyone",
            ]
        );

        let outcome = run(&core, OPERATOR, ".permit juggle mods").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { error: CommandError::Syntax(_), .. }));
    }

    #[tokio::test]
    async fn test_help_lists_and_describes() {
        let (core, messenger) = core().await;
        run(&core, UserId(5), ".help").await;
        run(&core, UserId(5), ".help latency").await;
        let outcome = run(&core, UserId(5), ".help nothing").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { .. }));

        let embeds = messenger.embeds();
        let names: Vec<_> = embeds[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![".ping", ".prefix", ".help", ".permit", ".reload"]);

        assert_eq!(embeds[1].title, ".ping");
        assert_eq!(embeds[1].fields[0].value, "latency");
        assert_eq!(embeds[2].title, "`help` failed");
    }

    #[tokio::test]
    async fn test_reload_is_operator_only() {
        let (core, messenger) = core().await;

        let outcome = run(&core, UserId(5), ".reload").await;
        assert!(matches!(outcome, DispatchOutcome::Errored { error: CommandError::Permission(_), .. }));

        assert!(run(&core, OPERATOR, ".reload").await.is_completed());
        let embeds = messenger.embeds();
        assert_eq!(embeds.last().map(|e| e.title.as_str()), Some("Extensions reloaded"));
        // The built-in survives its own reload.
        assert!(run(&core, UserId(5), ".ping").await.is_completed());
    }

    #[tokio::test]
    async fn test_prefix_hint_needs_mention_and_word() {
        let (core, messenger) = core().await;
        core.store().with_guild(G, "set-prefix", |r| r.prefix = "$".into());

        assert_eq!(run_responses(&core, message(Some(G), UserId(5), "<@999> what's the prefix?")).await, 1);
        assert_eq!(run_responses(&core, message(Some(G), UserId(5), "<@!999> hello")).await, 0);
        assert_eq!(run_responses(&core, message(Some(G), UserId(5), "what prefix?")).await, 0);

        assert_eq!(messenger.texts(), vec!["My prefix here is `$`. Try `$help`."]);
    }
}
