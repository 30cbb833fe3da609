//! Capability checks against a community's permission groups.

use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};

/// Allowed to change the command prefix.
pub const MANAGE_PREFIX: &str = "manage-prefix";

/// Allowed to grant and revoke permission groups.
pub const MANAGE_PERMISSIONS: &str = "manage-permissions";

/// Fails with [`CommandError::Permission`] unless the author may use `group`.
///
/// The operator always passes.  In a community, a group nobody has been
/// granted is open to everyone; otherwise the author must be a member.
/// Direct messages have no groups, so only the operator passes there.
pub fn require_permission(ctx: &CommandContext, group: &str) -> CommandResult<()> {
    let author = ctx.author();
    if ctx.core.store().is_operator(author) {
        return Ok(());
    }

    let Some(guild) = ctx.guild_id() else {
        return Err(CommandError::permission(format!(
            "`{group}` can only be granted inside a server"
        )));
    };

    let allowed = ctx.store().read_guild(guild, "permission-check", |record| {
        record.is_none_or(|r| r.group_is_open(group) || r.has_permission(group, author))
    });

    if allowed {
        Ok(())
    } else {
        Err(CommandError::permission(format!(
            "you need the `{group}` permission"
        )))
    }
}

/// Fails unless the author is the operator.
pub fn require_operator(ctx: &CommandContext) -> CommandResult<()> {
    if ctx.core.store().is_operator(ctx.author()) {
        Ok(())
    } else {
        Err(CommandError::permission("only the bot operator can do that"))
    }
}
