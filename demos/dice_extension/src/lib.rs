//! Dice rolling, shipped as a loadable module.
//!
//! Build with `cargo build -p dice-extension` and copy the resulting shared
//! library into the bot's extension directory.  `extension_config/dice.json`
//! may override the limits:
//!
//! ```json
//! { "max_dice": 10, "max_sides": 100 }
//! ```

use std::sync::Arc;

use guildkit_framework::export_extension;
use guildkit_framework::prelude::*;
use rand::Rng;
use serde::Deserialize;

const NAME: &str = "dice";
const REROLL_EMOJI: &str = "🎲";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiceConfig {
    pub max_dice: u32,
    pub max_sides: u32,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self {
            max_dice: 20,
            max_sides: 1000,
        }
    }
}

/// A parsed `NdM` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roll {
    pub count: u32,
    pub sides: u32,
}

impl Roll {
    /// Parses `NdM`, `dM` or a bare `M`.
    pub fn parse(expr: &str, limits: &DiceConfig) -> CommandResult<Self> {
        let expr = expr.trim().to_ascii_lowercase();
        let (count, sides) = match expr.split_once('d') {
            Some(("", sides)) => ("1", sides),
            Some((count, sides)) => (count, sides),
            None => ("1", expr.as_str()),
        };
        let bad = || CommandError::syntax(format!("`{expr}` is not a dice expression like 2d6"));
        let count: u32 = count.parse().map_err(|_| bad())?;
        let sides: u32 = sides.parse().map_err(|_| bad())?;

        if count == 0 || sides == 0 {
            return Err(bad());
        }
        if count > limits.max_dice || sides > limits.max_sides {
            return Err(CommandError::syntax(format!(
                "at most {} dice with {} sides",
                limits.max_dice, limits.max_sides
            )));
        }
        Ok(Self { count, sides })
    }

    pub fn roll(self, rng: &mut impl Rng) -> Vec<u32> {
        (0..self.count).map(|_| rng.gen_range(1..=self.sides)).collect()
    }
}

fn describe(roll: Roll, faces: &[u32]) -> String {
    let total: u32 = faces.iter().sum();
    let faces = faces
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" + ");
    format!("{}d{}: {faces} = {total}", roll.count, roll.sides)
}

pub fn init(ctx: &InitContext) -> Result<ExtensionDescriptor, BoxError> {
    let limits: Arc<DiceConfig> = ctx.config(NAME)?;
    tracing::debug!(?limits, "dice limits");

    let roll_limits = Arc::clone(&limits);
    Ok(ExtensionDescriptor::new(NAME, env!("CARGO_PKG_VERSION"))
        .description("Rolls dice")
        .command(
            CommandDescriptor::new("roll", move |ctx: CommandContext| {
                let limits = Arc::clone(&roll_limits);
                async move {
                    let expr = ctx.args.optional(1).unwrap_or("1d6");
                    let roll = Roll::parse(expr, &limits)?;
                    let faces = roll.roll(&mut rand::thread_rng());
                    ctx.reply(&describe(roll, &faces)).await?;
                    Ok(())
                }
            })
            .alias("r")
            .alias("dice")
            .usage("[NdM]")
            .description("Rolls N dice with M sides, 1d6 by default"),
        )
        .handler(RawHandlerDescriptor::new(
            "reroll",
            EventKind::ReactionAdded,
            |ctx: RawContext<ReactionEvent>| async move {
                if ctx.payload.emoji != REROLL_EMOJI || ctx.payload.user_id == ctx.core.self_id() {
                    return;
                }
                let roll = Roll { count: 1, sides: 6 };
                let faces = roll.roll(&mut rand::thread_rng());
                let text = format!("<@{}> {}", ctx.payload.user_id, describe(roll, &faces));
                if let Err(e) = ctx
                    .core
                    .messenger()
                    .send_message(ctx.payload.channel_id, &text)
                    .await
                {
                    tracing::debug!(error = %e, "reroll reply failed");
                }
            },
        ))
        .config(limits))
}

export_extension!(init);

#[cfg(test)]
mod tests {
    use super::*;
    use guildkit_core::testing::RecordingMessenger;
    use guildkit_core::{ChannelId, GuildId, MessageId, UserId};
    use guildkit_framework::extension::CatalogLoader;
    use guildkit_framework::{GuildStore, dispatch_command};

    #[test]
    fn test_parse_forms() {
        let limits = DiceConfig::default();
        assert_eq!(Roll::parse("2d6", &limits).unwrap(), Roll { count: 2, sides: 6 });
        assert_eq!(Roll::parse("D20", &limits).unwrap(), Roll { count: 1, sides: 20 });
        assert_eq!(Roll::parse("8", &limits).unwrap(), Roll { count: 1, sides: 8 });
        assert!(Roll::parse("0d6", &limits).is_err());
        assert!(Roll::parse("2dx", &limits).is_err());
        assert!(Roll::parse("21d6", &limits).is_err());
    }

    #[test]
    fn test_faces_stay_in_range() {
        let roll = Roll { count: 50, sides: 3 };
        let faces = roll.roll(&mut rand::thread_rng());
        assert_eq!(faces.len(), 50);
        assert!(faces.iter().all(|f| (1..=3).contains(f)));
    }

    #[tokio::test]
    async fn test_roll_command_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new(UserId(1)));
        let core = BotCore::builder(GuildStore::new("."), messenger.clone())
            .loader(Arc::new(CatalogLoader::new()))
            .config_dir(dir.path())
            .build();
        assert!(core.register_builtin(init).await.is_clean());

        let event = Arc::new(MessageEvent {
            id: MessageId(1),
            guild_id: Some(GuildId(1)),
            channel_id: ChannelId(1),
            author_id: UserId(2),
            author_is_bot: false,
            content: ".r 3d1".into(),
        });
        assert!(dispatch_command(&core, event).await.is_completed());
        assert_eq!(messenger.texts(), vec!["3d1: 1 + 1 + 1 = 3"]);
        assert!(core.extension_config::<DiceConfig>(NAME).is_some());
    }
}
