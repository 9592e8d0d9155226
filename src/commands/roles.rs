use crate::action::{Action, QueuedAction, RolePair};
use crate::discord::Context;
use crate::discord::Error;
use crate::executor::{emoji_key, ActionExecutor};
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{Mentionable, MessageBuilder};
use std::convert::TryFrom;

/// Manage reaction role messages.
#[poise::command(
    slash_command,
    guild_only,
    check = "crate::checks::is_admin",
    subcommands("create", "add", "remove", "list")
)]
pub async fn reactionrole(_ctx: Context<'_>) -> Result<(), Error> {
    // Discord doesn't allow root commands to be invoked. Only Subcommands.
    Ok(())
}

/// Send a message and map emoji reactions on it to roles.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Channel to send the message to"] channel: serenity::ChannelId,
    #[description = "Text of the message"] content: String,
    #[description = "emoji:Role Name pairs separated by commas"] pairs: String,
) -> Result<(), Error> {
    let action = match Action::create_reaction_role_message(channel.get(), &content, &pairs) {
        Ok(action) => action,
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    ctx.defer().await?;
    let queued = QueuedAction::new(action, ctx.author().tag());
    match ctx.data().executor.execute(&queued).await {
        Ok(()) => {
            ctx.say(format!(
                "Reaction role message created in {}.",
                channel.mention()
            ))
            .await?
        }
        Err(e) => ctx.say(format!("❌ Failed: {}", e)).await?,
    };
    Ok(())
}

/// Attach emoji -> role pairs to an existing message in this channel.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Id of the message in this channel"] message_id: String,
    #[description = "emoji:Role Name pairs separated by commas"] pairs: String,
) -> Result<(), Error> {
    let message_id = match message_id.trim().parse::<u64>() {
        Ok(id) if id != 0 => id,
        _ => {
            ctx.say("That isn't a valid message id.").await?;
            return Ok(());
        }
    };
    let pairs = match RolePair::parse_list(&pairs) {
        Ok(pairs) => pairs,
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    ctx.defer().await?;
    match ctx
        .data()
        .executor
        .attach_reaction_roles(ctx.channel_id().get(), message_id, &pairs)
        .await
    {
        Ok(()) => {
            ctx.say(format!(
                "Added {} reaction role(s) to message `{}`.",
                pairs.len(),
                message_id
            ))
            .await?
        }
        Err(e) => ctx.say(format!("❌ Failed: {}", e)).await?,
    };
    Ok(())
}

/// Remove one emoji mapping from a reaction role message.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Id of the reaction role message"] message_id: String,
    #[description = "Emoji to unmap"] emoji: String,
) -> Result<(), Error> {
    let key = serenity::ReactionType::try_from(emoji.as_str())
        .map(|reaction| emoji_key(&reaction))
        .unwrap_or_else(|_| emoji.clone());

    let removed = {
        let mut store = ctx.data().store.lock().await;
        let removed = store.document_mut().unmap_reaction_role(&message_id, &key);
        if removed {
            store.save_logged("Remove reaction role").await;
        }
        removed
    };

    if removed {
        ctx.say(format!(
            "Removed {} from message `{}`.",
            emoji, message_id
        ))
        .await?;
    } else {
        ctx.say(format!(
            "No mapping for {} on message `{}`.",
            emoji, message_id
        ))
        .await?;
    }
    Ok(())
}

/// List all reaction role mappings.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let mut response = MessageBuilder::new();
    response.push_bold_line("Reaction role messages:");
    {
        let store = ctx.data().store.lock().await;
        let mappings = &store.document().reaction_roles;
        if mappings.is_empty() {
            response.push_line("None configured.");
        }
        for (message_id, mapping) in mappings {
            response.push_line(format!("Message `{}`:", message_id));
            for (key, role_id) in mapping {
                response.push_line(format!("  {} -> <@&{}>", key, role_id));
            }
        }
    }

    ctx.say(response.build()).await?;
    Ok(())
}

/// Send a message with buttons that toggle roles.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn role_buttons(
    ctx: Context<'_>,
    #[description = "Channel to send the message to"] channel: serenity::ChannelId,
    #[description = "Text of the message"] content: String,
    #[description = "Label:Role Name pairs separated by commas"] buttons: String,
) -> Result<(), Error> {
    let action = match Action::create_role_button_message(channel.get(), &content, &buttons) {
        Ok(action) => action,
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    ctx.defer().await?;
    let queued = QueuedAction::new(action, ctx.author().tag());
    match ctx.data().executor.execute(&queued).await {
        Ok(()) => {
            ctx.say(format!(
                "Role button message created in {}.",
                channel.mention()
            ))
            .await?
        }
        Err(e) => ctx.say(format!("❌ Failed: {}", e)).await?,
    };
    Ok(())
}
