use crate::commands;
use crate::events;
use crate::executor::DiscordExecutor;
use crate::processor::Processor;
use crate::queue::ActionQueue;
use crate::settings::Settings;
use crate::store::Store;
use anyhow::Result;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct Data {
    pub settings: Arc<Mutex<Settings>>,
    pub store: Arc<Mutex<Store>>,
    pub queue: ActionQueue,
    pub processor: Processor,
    pub executor: Arc<DiscordExecutor>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub async fn run(settings: Settings, store: Store, queue: ActionQueue) -> Result<()> {
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let token = settings.token.clone();
    let guild_id = serenity::GuildId::new(settings.guild_id);
    let poll_interval = Duration::from_secs(settings.queue_poll_secs.max(1));

    let store = Arc::new(Mutex::new(store));
    let settings = Arc::new(Mutex::new(settings));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::handle(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                    .await?;
                log::info!("Slash commands registered for guild {}.", guild_id);

                let executor = Arc::new(DiscordExecutor::new(
                    ctx.http.clone(),
                    guild_id,
                    Arc::clone(&store),
                ));
                let processor = Processor::new(queue.clone(), executor.clone(), poll_interval);
                processor.start().await;

                Ok(Data {
                    settings,
                    store,
                    queue,
                    processor,
                    executor,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await?;

    Ok(client.start().await?)
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!("Command '{}' failed: {:?}", ctx.command().name, error);
            let _ = ctx
                .say("Something went wrong executing this command.")
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                log::error!("Error while handling error: {}", e);
            }
        }
    }
}
