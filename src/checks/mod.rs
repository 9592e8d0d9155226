use crate::discord::Context;
use crate::discord::Error;

/// Checks whether the user has guild management permissions (or is the
/// bot owner).
pub async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let owner = ctx.data().settings.lock().await.owner;
    if ctx.author().id.get() == owner {
        return Ok(true);
    }

    if let Some(member) = ctx.author_member().await {
        let admin = member.permissions.map_or(false, |p| {
            p.administrator() || p.manage_guild() || p.manage_roles()
        });
        if admin {
            return Ok(true);
        }
    }

    ctx.say("You need to be an Admin to execute this command.")
        .await?;
    Ok(false)
}

/// Checks whether the user is the bot owner.
pub async fn is_owner(ctx: Context<'_>) -> Result<bool, Error> {
    let settings = ctx.data().settings.lock().await;

    if settings.owner == ctx.author().id.get() {
        Ok(true)
    } else {
        ctx.say("You need to be the bot owner to execute this command.")
            .await?;
        Ok(false)
    }
}

/// Whether `command` may run in the current channel. Commands without a
/// configured channel list run everywhere.
pub async fn command_allowed(ctx: &Context<'_>, command: &str) -> bool {
    let store = ctx.data().store.lock().await;
    match store.document().command_channels.get(command) {
        Some(channels) if !channels.is_empty() => channels.contains(&ctx.channel_id().get()),
        _ => true,
    }
}
