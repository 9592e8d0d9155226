use crate::discord::Context;
use crate::discord::Error;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Mentionable;

/// Set (or clear) the channel new members are greeted in.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn welcome_channel(
    ctx: Context<'_>,
    #[description = "Channel for greetings, omit to disable them"] channel: Option<serenity::ChannelId>,
) -> Result<(), Error> {
    let channel_id = channel.map(|c| c.get());
    {
        let mut store = ctx.data().store.lock().await;
        store.document_mut().config.welcome_channel = channel_id;
        store.save_logged("Set welcome channel").await;
    }

    match channel_id {
        Some(id) => {
            ctx.say(format!(
                "New members are greeted in {} now.",
                serenity::ChannelId::new(id).mention()
            ))
            .await?
        }
        None => ctx.say("Welcome messages disabled.").await?,
    };
    Ok(())
}

/// Set the greeting template. `{member}` is replaced with a mention.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn welcome_message(
    ctx: Context<'_>,
    #[description = "Greeting text, {member} mentions the new member"] message: String,
) -> Result<(), Error> {
    if message.trim().is_empty() {
        ctx.say("The welcome message must not be empty.").await?;
        return Ok(());
    }

    {
        let mut store = ctx.data().store.lock().await;
        store.document_mut().config.welcome_message = Some(message.clone());
        store.save_logged("Set welcome message").await;
    }

    ctx.say(format!("Welcome message set to:\n> {}", message))
        .await?;
    Ok(())
}

/// Set (or clear) the background image url used by the dashboard's
/// welcome card.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn welcome_image(
    ctx: Context<'_>,
    #[description = "Image url, omit to clear"] url: Option<String>,
) -> Result<(), Error> {
    if let Some(url) = &url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            ctx.say("The image url must start with http:// or https://.")
                .await?;
            return Ok(());
        }
    }

    {
        let mut store = ctx.data().store.lock().await;
        store.document_mut().config.welcome_background = url.clone();
        store.save_logged("Set welcome image").await;
    }

    match url {
        Some(url) => ctx.say(format!("Welcome image set to <{}>.", url)).await?,
        None => ctx.say("Welcome image cleared.").await?,
    };
    Ok(())
}

/// Set (or clear) the channel automatic moderation reports go to.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn modlog_channel(
    ctx: Context<'_>,
    #[description = "Channel for reports, omit to disable them"] channel: Option<serenity::ChannelId>,
) -> Result<(), Error> {
    let channel_id = channel.map(|c| c.get());
    {
        let mut store = ctx.data().store.lock().await;
        store.document_mut().config.modlog_channel = channel_id;
        store.save_logged("Set modlog channel").await;
    }

    match channel_id {
        Some(id) => {
            ctx.say(format!(
                "Moderation reports go to {} now.",
                serenity::ChannelId::new(id).mention()
            ))
            .await?
        }
        None => ctx.say("Moderation reports disabled.").await?,
    };
    Ok(())
}

/// Toggle whether a command is restricted to a channel. A command with no
/// restrictions runs everywhere.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn command_channel(
    ctx: Context<'_>,
    #[description = "Command name, e.g. rank"] command: String,
    #[description = "Channel to toggle"] channel: serenity::ChannelId,
) -> Result<(), Error> {
    let command = command.trim().trim_start_matches('/').to_lowercase();
    if command.is_empty() {
        ctx.say("Give me a command name, e.g. `rank`.").await?;
        return Ok(());
    }
    let id = channel.get();

    let allowed = {
        let mut store = ctx.data().store.lock().await;
        let channels = store
            .document_mut()
            .command_channels
            .entry(command.clone())
            .or_default();
        let allowed = if channels.contains(&id) {
            channels.remove(&id);
            false
        } else {
            channels.insert(id);
            true
        };
        store.save_logged("Toggle command channel").await;
        allowed
    };

    if allowed {
        ctx.say(format!(
            "`/{}` is now allowed in {}.",
            command,
            channel.mention()
        ))
        .await?;
    } else {
        ctx.say(format!(
            "{} removed from `/{}`'s allowed channels.",
            channel.mention(),
            command
        ))
        .await?;
    }
    Ok(())
}
