use crate::discord::{Data, Error};
use crate::executor::emoji_keys;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Mentionable;

pub async fn handle(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            log::info!("Connected as {}!", data_about_bot.user.name);
            ctx.set_activity(Some(serenity::ActivityData::watching("over the community")));
            Ok(())
        }
        serenity::FullEvent::Resume { .. } => {
            log::info!("Connection to discord resumed.");
            Ok(())
        }
        serenity::FullEvent::Message { new_message } => message(ctx, data, new_message).await,
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            reaction(ctx, data, add_reaction, true).await
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            reaction(ctx, data, removed_reaction, false).await
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            member_join(ctx, data, new_member).await
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let serenity::Interaction::Component(component) = interaction {
                role_button(ctx, data, component).await?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<(), Error> {
    if msg.author.bot {
        return Ok(());
    }
    let guild_id = match msg.guild_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let content = msg.content.trim().to_string();
    let uid = msg.author.id.to_string();

    // Media posts neither earn XP nor count towards moderation.
    if !msg.attachments.is_empty() || !msg.sticker_items.is_empty() || is_gif_link(&content) {
        return Ok(());
    }

    let staff = is_staff(ctx, guild_id, msg.author.id).await;

    let links_blocked = {
        let store = data.store.lock().await;
        store
            .document()
            .blocked_links_channels
            .contains(&msg.channel_id.get())
    };
    if links_blocked && contains_link(&content) && !staff {
        if let Err(e) = msg.delete(&ctx.http).await {
            log::warn!("Failed to delete blocked link message: {}", e);
        }
        let _ = msg
            .channel_id
            .say(
                &ctx.http,
                format!("⚠️ {}, links are not allowed here!", msg.author.mention()),
            )
            .await;
        auto_warn(ctx, data, &uid, "Posted a link in a blocked channel").await;
        return Ok(());
    }

    let repeated = {
        let mut store = data.store.lock().await;
        store.document_mut().record_message(&uid, &content)
    };
    if repeated && !staff {
        if let Err(e) = msg.delete(&ctx.http).await {
            log::warn!("Failed to delete repeated message: {}", e);
        }
        let _ = msg
            .channel_id
            .say(
                &ctx.http,
                format!(
                    "⚠️ {}, please don't repeat the same message.",
                    msg.author.mention()
                ),
            )
            .await;
        auto_warn(ctx, data, &uid, "Repeated message spam").await;
        return Ok(());
    }

    let (level_up, levelup_channel, level_role) = {
        let mut store = data.store.lock().await;
        let doc = store.document_mut();
        let level_up = doc.award_xp(&uid);
        let levelup_channel = doc.config.levelup_channel;
        let level_role = level_up.and_then(|level| {
            doc.level_roles
                .get(&level.to_string())
                .and_then(|role| role.parse::<u64>().ok())
                .filter(|&id| id != 0)
        });
        if let Some(level) = level_up {
            doc.log(format!("level_up: user={} level={}", uid, level));
        }
        store.save_logged("XP update").await;
        (level_up, levelup_channel, level_role)
    };

    if let Some(level) = level_up {
        let channel = levelup_channel
            .filter(|&id| id != 0)
            .map(serenity::ChannelId::new)
            .unwrap_or(msg.channel_id);
        let _ = channel
            .say(
                &ctx.http,
                format!("🎉 {} reached level **{}**!", msg.author.mention(), level),
            )
            .await;

        if let Some(role_id) = level_role {
            let reason = format!("Reached level {}", level);
            if let Err(e) = ctx
                .http
                .add_member_role(
                    guild_id,
                    msg.author.id,
                    serenity::RoleId::new(role_id),
                    Some(&reason),
                )
                .await
            {
                log::warn!("Failed to grant level role {}: {}", role_id, e);
                let _ = channel
                    .say(
                        &ctx.http,
                        "⚠️ Couldn't grant the level role, check my permissions.",
                    )
                    .await;
            }
        }
    }
    Ok(())
}

async fn reaction(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
    added: bool,
) -> Result<(), Error> {
    let (guild_id, user_id) = match (reaction.guild_id, reaction.user_id) {
        (Some(guild_id), Some(user_id)) => (guild_id, user_id),
        _ => return Ok(()),
    };
    let me = ctx.cache.current_user().id;
    if user_id == me {
        return Ok(());
    }

    let keys = emoji_keys(&reaction.emoji);
    let role_id = {
        let store = data.store.lock().await;
        store
            .document()
            .reaction_role(reaction.message_id.get(), &keys)
    };
    let role_id = match role_id {
        Some(id) => serenity::RoleId::new(id),
        None => return Ok(()),
    };

    let result = if added {
        ctx.http
            .add_member_role(guild_id, user_id, role_id, Some("Reaction role"))
            .await
    } else {
        ctx.http
            .remove_member_role(guild_id, user_id, role_id, Some("Reaction role"))
            .await
    };
    match result {
        Ok(()) => {
            let mut store = data.store.lock().await;
            store.document_mut().log(format!(
                "reaction_role_{}: user={} role={} message={}",
                if added { "add" } else { "remove" },
                user_id,
                role_id,
                reaction.message_id
            ));
            // Flushed with the next save; reaction traffic alone doesn't
            // hit the remote store.
        }
        Err(e) => log::warn!("Failed to toggle reaction role {}: {}", role_id, e),
    }
    Ok(())
}

async fn member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    let (channel, template) = {
        let store = data.store.lock().await;
        let config = &store.document().config;
        (config.welcome_channel, config.welcome_message.clone())
    };
    let channel = match channel.filter(|&id| id != 0) {
        Some(id) => serenity::ChannelId::new(id),
        None => return Ok(()),
    };

    let template =
        template.unwrap_or_else(|| "Hello {member}, welcome to the server!".to_string());
    let text = template.replace("{member}", &member.mention().to_string());
    if let Err(e) = channel.say(&ctx.http, text).await {
        log::warn!("Failed to send welcome message: {}", e);
    }

    let mut store = data.store.lock().await;
    store
        .document_mut()
        .log(format!("member_join: user={}", member.user.id));
    Ok(())
}

async fn role_button(
    ctx: &serenity::Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let role_id = match component
        .data
        .custom_id
        .strip_prefix("rolebtn:")
        .and_then(|id| id.parse::<u64>().ok())
        .filter(|&id| id != 0)
    {
        Some(id) => serenity::RoleId::new(id),
        None => return Ok(()),
    };
    let guild_id = match component.guild_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let member = match &component.member {
        Some(member) => member,
        None => return Ok(()),
    };

    let had_role = member.roles.contains(&role_id);
    let result = if had_role {
        ctx.http
            .remove_member_role(guild_id, component.user.id, role_id, Some("Role button"))
            .await
    } else {
        ctx.http
            .add_member_role(guild_id, component.user.id, role_id, Some("Role button"))
            .await
    };

    let reply = match (&result, had_role) {
        (Ok(()), true) => format!("Removed {} from you.", role_id.mention()),
        (Ok(()), false) => format!("You received {}.", role_id.mention()),
        (Err(e), _) => {
            log::warn!("Failed to toggle button role {}: {}", role_id, e);
            "Couldn't toggle that role, check my permissions.".to_string()
        }
    };
    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(reply)
                    .ephemeral(true),
            ),
        )
        .await?;

    if result.is_ok() {
        let mut store = data.store.lock().await;
        store.document_mut().log(format!(
            "role_button_click: user={} role={} message={}",
            component.user.id, role_id, component.message.id
        ));
    }
    Ok(())
}

async fn auto_warn(ctx: &serenity::Context, data: &Data, uid: &str, reason: &str) {
    let modlog = {
        let mut store = data.store.lock().await;
        let doc = store.document_mut();
        doc.add_warn(uid, "bot", reason);
        doc.log(format!("warn: user={} by=bot reason={}", uid, reason));
        let modlog = doc.config.modlog_channel;
        store.save_logged("Auto-warn").await;
        modlog
    };

    if let Some(channel) = modlog.filter(|&id| id != 0) {
        let _ = serenity::ChannelId::new(channel)
            .say(&ctx.http, format!("⚠️ Warned <@{}>: {}", uid, reason))
            .await;
    }
}

async fn is_staff(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> bool {
    let member = match guild_id.member(ctx, user_id).await {
        Ok(member) => member,
        Err(_) => return false,
    };
    let permissions = match ctx.cache.guild(guild_id) {
        Some(guild) => guild.member_permissions(&member),
        None => return false,
    };
    permissions.administrator() || permissions.manage_guild() || permissions.manage_messages()
}

fn contains_link(content: &str) -> bool {
    content
        .split_whitespace()
        .any(|word| word.starts_with("http://") || word.starts_with("https://"))
}

fn is_gif_link(content: &str) -> bool {
    let content = content.to_lowercase();
    ["tenor.com", "giphy.com", "imgur.com"]
        .iter()
        .any(|domain| content.contains(domain))
}
