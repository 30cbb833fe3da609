//! Mention syntax helpers.
//!
//! User mentions are written `<@id>` or `<@!id>` (nickname form); channel
//! mentions are written `<#id>`.  Bare numeric ids are accepted too, since
//! users often paste them directly.

use crate::id::{ChannelId, UserId};

/// Parses a user mention or bare user id.
pub fn parse_user_mention(token: &str) -> Option<UserId> {
    let inner = token
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
        .unwrap_or(token);
    parse_digits(inner).map(UserId)
}

/// Parses a channel mention or bare channel id.
pub fn parse_channel_mention(token: &str) -> Option<ChannelId> {
    let inner = token
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    parse_digits(inner).map(ChannelId)
}

/// Returns `true` when `content` contains a mention of `user` in either form.
pub fn mentions_user(content: &str, user: UserId) -> bool {
    content.contains(&format!("<@{user}>")) || content.contains(&format!("<@!{user}>"))
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
