use crate::checks;
use crate::data::xp_to_level;
use crate::discord::Context;
use crate::discord::Error;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{Mentionable, MessageBuilder};

/// Show a member's XP, level and rank.
#[poise::command(slash_command, guild_only)]
pub async fn rank(
    ctx: Context<'_>,
    #[description = "Member to look up (defaults to you)"] member: Option<serenity::User>,
) -> Result<(), Error> {
    if !checks::command_allowed(&ctx, "rank").await {
        ctx.send(
            poise::CreateReply::default()
                .content("This command is not allowed in this channel.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let target = member.unwrap_or_else(|| ctx.author().clone());
    let uid = target.id.to_string();

    let (xp, level, position, total) = {
        let store = ctx.data().store.lock().await;
        let doc = store.document();
        let xp = doc.xp.get(&uid).copied().unwrap_or(0);
        let level = doc
            .level
            .get(&uid)
            .copied()
            .unwrap_or_else(|| xp_to_level(xp));

        let mut ranking: Vec<_> = doc.xp.iter().collect();
        ranking.sort_by(|a, b| b.1.cmp(a.1));
        let position = ranking
            .iter()
            .position(|(id, _)| **id == uid)
            .map(|p| p + 1)
            .unwrap_or(ranking.len() + 1);
        (xp, level, position, ranking.len())
    };

    ctx.send(
        poise::CreateReply::default().embed(
            serenity::CreateEmbed::new()
                .title(format!("{}'s profile", target.name))
                .field("Level", level.to_string(), true)
                .field("XP", xp.to_string(), true)
                .field("Rank", format!("#{} of {}", position, total), true),
        ),
    )
    .await?;
    Ok(())
}

/// Show the ten members with the most XP.
#[poise::command(slash_command, guild_only)]
pub async fn top(ctx: Context<'_>) -> Result<(), Error> {
    if !checks::command_allowed(&ctx, "top").await {
        ctx.send(
            poise::CreateReply::default()
                .content("This command is not allowed in this channel.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let mut response = MessageBuilder::new();
    response.push_bold_line("🏆 Top 10 XP");
    {
        let store = ctx.data().store.lock().await;
        let doc = store.document();
        let mut ranking: Vec<_> = doc.xp.iter().collect();
        ranking.sort_by(|a, b| b.1.cmp(a.1));

        if ranking.is_empty() {
            response.push_line("Nobody has earned XP yet.");
        }
        for (position, (uid, xp)) in ranking.into_iter().take(10).enumerate() {
            response.push_line(format!(
                "{}. <@{}> — {} XP (level {})",
                position + 1,
                uid,
                xp,
                doc.level
                    .get(uid.as_str())
                    .copied()
                    .unwrap_or_else(|| xp_to_level(*xp))
            ));
        }
    }

    ctx.say(response.build()).await?;
    Ok(())
}

/// Set the XP rate divisor. Higher values slow leveling down.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn xp_rate(
    ctx: Context<'_>,
    #[description = "Divisor applied to the base XP gain"]
    #[min = 1]
    #[max = 100]
    rate: u32,
) -> Result<(), Error> {
    let mut store = ctx.data().store.lock().await;
    store.document_mut().config.xp_rate = i64::from(rate.max(1));
    store
        .document_mut()
        .log(format!("xp_rate set to {} by {}", rate, ctx.author().id));
    store.save_logged("Set XP rate").await;

    ctx.say(format!("XP rate set to {}.", rate.max(1))).await?;
    Ok(())
}

/// Set (or clear) the channel level-up announcements go to.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn levelup_channel(
    ctx: Context<'_>,
    #[description = "Channel for announcements, omit to announce in place"] channel: Option<serenity::ChannelId>,
) -> Result<(), Error> {
    let channel_id = channel.map(|c| c.get());
    {
        let mut store = ctx.data().store.lock().await;
        store.document_mut().config.levelup_channel = channel_id;
        store.save_logged("Set levelup channel").await;
    }

    match channel_id {
        Some(id) => {
            ctx.say(format!(
                "Level-up announcements go to {} now.",
                serenity::ChannelId::new(id).mention()
            ))
            .await?
        }
        None => {
            ctx.say("Level-up announcements go to the channel the message was sent in.")
                .await?
        }
    };
    Ok(())
}

/// Grant a role automatically when a member reaches a level.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn level_role(
    ctx: Context<'_>,
    #[description = "Level that grants the role"]
    #[min = 1]
    level: u32,
    #[description = "Role to grant"] role: serenity::Role,
) -> Result<(), Error> {
    {
        let mut store = ctx.data().store.lock().await;
        store
            .document_mut()
            .level_roles
            .insert(level.to_string(), role.id.get().to_string());
        store.save_logged("Set level role").await;
    }

    ctx.say(format!(
        "Members reaching level {} now receive {}.",
        level,
        role.mention()
    ))
    .await?;
    Ok(())
}
