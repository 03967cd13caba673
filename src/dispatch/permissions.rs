use serenity::model::Permissions;

use crate::commands::CommandDescriptor;

pub const OWNER_ONLY: &str = "This command is restricted to bot operators.";
const UNEXPLAINED: &str =
    "Something went wrong while checking permissions. Please report this to the bot operators.";

/// What is known about the caller when deciding whether a command may run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionInput {
    /// The member's permissions in the invoking channel, outside guilds `None`.
    pub user: Option<Permissions>,
    /// The bot's permissions in the invoking channel, if Discord told us.
    pub bot: Option<Permissions>,
    pub in_guild: bool,
    pub is_operator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheck {
    pub can_run: bool,
    pub has_admin: bool,
    /// Holding any one of these would have been enough.
    pub missing_user: Permissions,
    /// Every one of these is needed.
    pub missing_bot: Permissions,
    pub reason: Option<String>,
}

/// Evaluates the descriptor's requirements. Pure, the caller decides what to
/// do with the result.
pub fn check(descriptor: &CommandDescriptor, input: &PermissionInput) -> PermissionCheck {
    let user = input.user.unwrap_or_else(Permissions::empty);
    let has_admin = input.in_guild && user.contains(Permissions::ADMINISTRATOR);

    let mut result = PermissionCheck {
        can_run: false,
        has_admin,
        missing_user: Permissions::empty(),
        missing_bot: Permissions::empty(),
        reason: None,
    };

    if descriptor.owner_only && !input.is_operator {
        result.reason = Some(OWNER_ONLY.to_owned());
        return result;
    }

    // permissions only mean something inside a guild
    if input.in_guild {
        let required = descriptor.user_permissions;
        if !required.is_empty() && !has_admin && !user.intersects(required) {
            result.missing_user = required;
        }

        if let Some(bot) = input.bot {
            if !bot.contains(Permissions::ADMINISTRATOR) {
                result.missing_bot = descriptor.bot_permissions - bot;
            }
        }
    }

    result.can_run = result.missing_user.is_empty() && result.missing_bot.is_empty();
    result
}

fn names(permissions: Permissions) -> String {
    permissions.get_permission_names().join(", ")
}

/// The message shown when a check fails without a custom reason.
pub fn diagnostic(check: &PermissionCheck) -> String {
    let mut lines = Vec::new();

    if !check.missing_user.is_empty() {
        lines.push(format!("**You need any of:** {}", names(check.missing_user)));
    }
    if !check.missing_bot.is_empty() {
        lines.push(format!("**I need all of:** {}", names(check.missing_bot)));
    }

    if lines.is_empty() {
        return UNEXPLAINED.to_owned();
    }

    lines.insert(0, "You can't use this command here.".to_owned());
    lines.join("\n")
}
