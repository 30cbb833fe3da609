//! Positional command arguments.
//!
//! Positions are 1-indexed: position 1 is the first token after the command
//! name.  Every accessor that can fail returns [`CommandError::Syntax`]
//! naming the position and what was expected there.

use std::str::FromStr;

use guildkit_core::{ChannelId, UserId, parse_channel_mention, parse_user_mention};

use crate::error::{CommandError, CommandResult};

/// Whitespace-separated tokens following a command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    tokens: Vec<String>,
}

impl Args {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Splits `text` on whitespace.
    pub fn parse_str(text: &str) -> Self {
        Self::new(text.split_whitespace().map(str::to_string).collect())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// The token at `position`, if present.
    pub fn optional(&self, position: usize) -> Option<&str> {
        let index = position.checked_sub(1)?;
        self.tokens.get(index).map(String::as_str)
    }

    /// The token at `position`, or a syntax error describing `what` was
    /// expected.
    pub fn arg(&self, position: usize, what: &str) -> CommandResult<&str> {
        self.optional(position)
            .ok_or_else(|| CommandError::syntax(format!("missing argument {position}: expected {what}")))
    }

    /// Tokens from `position` onwards, joined by single spaces.
    pub fn rest_from(&self, position: usize) -> Option<String> {
        let index = position.checked_sub(1)?;
        let rest = self.tokens.get(index..)?;
        (!rest.is_empty()).then(|| rest.join(" "))
    }

    /// Parses the token at `position` as `T`.
    pub fn parse<T: FromStr>(&self, position: usize, what: &str) -> CommandResult<T> {
        let raw = self.arg(position, what)?;
        raw.parse().map_err(|_| {
            CommandError::syntax(format!("argument {position}: `{raw}` is not {what}"))
        })
    }

    /// Parses a user mention (or bare id) at `position`.
    pub fn user(&self, position: usize) -> CommandResult<UserId> {
        let raw = self.arg(position, "a user mention")?;
        parse_user_mention(raw).ok_or_else(|| {
            CommandError::syntax(format!("argument {position}: `{raw}` is not a user mention"))
        })
    }

    /// Parses a channel mention (or bare id) at `position`.
    pub fn channel(&self, position: usize) -> CommandResult<ChannelId> {
        let raw = self.arg(position, "a channel mention")?;
        parse_channel_mention(raw).ok_or_else(|| {
            CommandError::syntax(format!("argument {position}: `{raw}` is not a channel mention"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_one_indexed() {
        let args = Args::parse_str("  grant   moderators <@42> ");
        assert_eq!(args.len(), 3);
        assert_eq!(args.optional(0), None);
        assert_eq!(args.optional(1), Some("grant"));
        assert_eq!(args.optional(3), Some("<@42>"));
        assert_eq!(args.optional(4), None);
    }

    #[test]
    fn test_missing_argument_is_syntax_error() {
        let args = Args::parse_str("one");
        let err = args.arg(2, "a group name").unwrap_err();
        assert!(matches!(err, CommandError::Syntax(_)));
        assert_eq!(err.to_string(), "missing argument 2: expected a group name");
    }

    #[test]
    fn test_rest_from() {
        let args = Args::parse_str("remind 10m stretch your legs");
        assert_eq!(args.rest_from(3).as_deref(), Some("stretch your legs"));
        assert_eq!(args.rest_from(6), None);
        assert_eq!(args.rest_from(0), None);
    }

    #[test]
    fn test_parse_and_mentions() {
        let args = Args::parse_str("15 abc <@!7> <#9> nope");
        assert_eq!(args.parse::<u32>(1, "a number").unwrap(), 15);
        assert!(matches!(args.parse::<u32>(2, "a number"), Err(CommandError::Syntax(_))));
        assert_eq!(args.user(3).unwrap(), UserId(7));
        assert_eq!(args.channel(4).unwrap(), ChannelId(9));
        assert!(args.user(5).is_err());
        assert!(args.channel(6).is_err());
    }
}
