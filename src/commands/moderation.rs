use crate::discord::Context;
use crate::discord::Error;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{Mentionable, MessageBuilder};

/// Warn a member. The warning is recorded in the guild document.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] member: serenity::User,
    #[description = "Why the warning is issued"] reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason.unwrap_or_else(|| "No reason given".to_string());
    let uid = member.id.to_string();
    let issued_by = ctx.author().tag();

    let count = {
        let mut store = ctx.data().store.lock().await;
        let doc = store.document_mut();
        doc.add_warn(&uid, &issued_by, &reason);
        doc.log(format!(
            "warn: user={} by={} reason={}",
            uid,
            ctx.author().id,
            reason
        ));
        let count = doc.warns.get(&uid).map_or(0, Vec::len);
        store.save_logged("New warn").await;
        count
    };

    ctx.say(format!(
        "⚠️ {} has been warned ({} total).\nReason: {}",
        member.mention(),
        count,
        reason
    ))
    .await?;
    Ok(())
}

/// List a member's warnings.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn warns(
    ctx: Context<'_>,
    #[description = "Member to look up"] member: serenity::User,
) -> Result<(), Error> {
    let uid = member.id.to_string();

    let mut response = MessageBuilder::new();
    {
        let store = ctx.data().store.lock().await;
        match store.document().warns.get(&uid) {
            Some(warns) if !warns.is_empty() => {
                response.push_bold_line(format!("Warnings for {} ({}):", member.name, warns.len()));
                for (index, warn) in warns.iter().enumerate() {
                    response.push_line(format!(
                        "{}. {} — by {} at {}",
                        index + 1,
                        warn.reason,
                        warn.by,
                        warn.ts
                    ));
                }
            }
            _ => {
                response.push_line(format!("{} has no warnings. 🎉", member.name));
            }
        }
    }

    ctx.say(response.build()).await?;
    Ok(())
}

/// Toggle link blocking for a channel. Links by non-staff get deleted there.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn block_links(
    ctx: Context<'_>,
    #[description = "Channel to toggle"] channel: serenity::ChannelId,
) -> Result<(), Error> {
    let id = channel.get();

    let blocked = {
        let mut store = ctx.data().store.lock().await;
        let channels = &mut store.document_mut().blocked_links_channels;
        let blocked = if channels.contains(&id) {
            channels.remove(&id);
            false
        } else {
            channels.insert(id);
            true
        };
        store
            .save_logged(if blocked {
                "Block links in channel"
            } else {
                "Allow links in channel"
            })
            .await;
        blocked
    };

    if blocked {
        ctx.say(format!("Links are now blocked in {}.", channel.mention()))
            .await?;
    } else {
        ctx.say(format!(
            "Links are allowed in {} again.",
            channel.mention()
        ))
        .await?;
    }
    Ok(())
}
