use crate::action::{Action, QueuedAction};
use crate::discord::Context;
use crate::discord::Error;
use crate::processor::PROCESS_NOW_TIMEOUT;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{Mentionable, MessageBuilder};

/// Force-save the guild document to the remote store.
#[poise::command(slash_command, check = "crate::checks::is_admin")]
pub async fn savedata(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    let result = {
        let mut store = ctx.data().store.lock().await;
        store.flush("Manual save").await
    };

    match result {
        Ok(()) => ctx.say("Guild data saved. 💾").await?,
        Err(e) => ctx.say(format!("❌ Saving failed: {}", e)).await?,
    };
    Ok(())
}

/// Inspect and drive the action queue.
#[poise::command(
    slash_command,
    check = "crate::checks::is_admin",
    subcommands("status", "process_now")
)]
pub async fn queue(_ctx: Context<'_>) -> Result<(), Error> {
    // Discord doesn't allow root commands to be invoked. Only Subcommands.
    Ok(())
}

/// Show processor state and the queue head.
#[poise::command(slash_command, check = "crate::checks::is_admin")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let status = ctx.data().processor.status();

    let mut response = MessageBuilder::new();
    response.push_bold_line("Action queue");
    response.push_bold("Processor: ");
    response.push_line(if status.running { "running" } else { "stopped" });
    response.push_bold("Depth: ");
    response.push_line(status.queue_depth.to_string());
    if !status.head.is_empty() {
        response.push_bold_line("Next up:");
        for entry in &status.head {
            response.push_line(format!("- {}", entry));
        }
    }

    ctx.say(response.build()).await?;
    Ok(())
}

/// Execute the head action immediately instead of waiting for the drain loop.
#[poise::command(slash_command, check = "crate::checks::is_admin")]
pub async fn process_now(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    match ctx
        .data()
        .processor
        .process_one_now(PROCESS_NOW_TIMEOUT)
        .await
    {
        Ok(remaining) => {
            ctx.say(format!("Executed the head action. {} remaining.", remaining))
                .await?
        }
        Err(e) => ctx.say(format!("❌ {}", e)).await?,
    };
    Ok(())
}

/// Queue an embed announcement. It is sent asynchronously by the processor.
#[poise::command(slash_command, guild_only, check = "crate::checks::is_admin")]
pub async fn announce(
    ctx: Context<'_>,
    #[description = "Channel to announce in"] channel: serenity::ChannelId,
    #[description = "Embed title"] title: String,
    #[description = "Embed body, use \\n for line breaks"] body: String,
    #[description = "Hex color like #FF0000"] color: Option<String>,
    #[description = "Image url"] image: Option<String>,
    #[description = "everyone or here"] mention: Option<String>,
) -> Result<(), Error> {
    let action = match Action::create_embed_message(
        channel.get(),
        &title,
        &body,
        color.as_deref(),
        image.as_deref(),
        mention.as_deref(),
    ) {
        Ok(action) => action,
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    let queue = &ctx.data().queue;
    queue.enqueue(QueuedAction::new(action, ctx.author().tag()));

    // Queued means accepted, not sent. `/queue status` shows progress.
    ctx.say(format!(
        "Announcement queued for {}. Queue depth: {}.",
        channel.mention(),
        queue.depth()
    ))
    .await?;
    Ok(())
}

/// Shutdown the bot.
#[poise::command(slash_command, check = "crate::checks::is_owner")]
pub async fn quit(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Shutting down!").await?;
    ctx.data().processor.stop().await;
    ctx.serenity_context().shard.shutdown_clean();
    Ok(())
}
