use anyhow::{Context, Result};
use wardbot::github::GithubContents;
use wardbot::keepalive::Keepalive;
use wardbot::queue::ActionQueue;
use wardbot::settings::Settings;
use wardbot::store::{PersistencePolicy, Store};
use wardbot::{discord, logger};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init()?;

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(_) => {
            Settings::default()
                .save()
                .await
                .context("Failed to save default config.")?;
            println!("Created default settings. Please fill out. Exiting...");
            std::process::exit(0);
        }
    };

    let remote = GithubContents::new(&settings).context("Failed to create remote store client.")?;
    let mut store = Store::new(Box::new(remote), PersistencePolicy::WriteThrough);
    match store.load().await {
        Ok(true) => log::info!("Loaded guild document from remote store."),
        Ok(false) => log::info!("No remote document yet. Starting with an empty one."),
        Err(e) => log::warn!("Failed to load remote document, starting empty: {}", e),
    }

    let keepalive = settings.keepalive_url.clone().map(Keepalive::start);

    let queue = ActionQueue::new();
    let result = discord::run(settings, store, queue)
        .await
        .context("Failed to start discord.");

    if let Some(keepalive) = keepalive {
        keepalive.stop().await;
    }
    result
}
