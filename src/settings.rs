use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const FILENAME: &str = "settings.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Discord's bot token
    pub token: String,
    /// Discord account id which owns the bot
    pub owner: u64,
    /// The guild this bot manages.
    pub guild_id: u64,
    /// GitHub account owning the data repository.
    pub github_user: String,
    /// GitHub repository holding the guild document.
    pub github_repo: String,
    /// Token with write access to the data repository.
    pub github_token: String,
    /// Path of the document inside the repository.
    pub data_file: String,
    /// Branch the document is committed to.
    pub branch: String,
    /// Seconds the queue processor sleeps between polls.
    pub queue_poll_secs: u64,
    /// Url pinged every five minutes to keep the host awake.
    pub keepalive_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::from("DISCORD_BOT_TOKEN_HERE"),
            owner: 999999999,
            guild_id: 999999999,
            github_user: String::from("GITHUB_USER_HERE"),
            github_repo: String::from("GITHUB_DATA_REPO_HERE"),
            github_token: String::from("GITHUB_TOKEN_HERE"),
            data_file: String::from("data.json"),
            branch: String::from("main"),
            queue_poll_secs: 1,
            keepalive_url: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings_path = std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string());

        let s = Config::builder()
            // Start off with the configuration file
            .add_source(File::with_name(&settings_path))
            // Add in settings from the environment (with a prefix of BOT)
            // Eg.. `BOT_TOKEN=...` would set the `token` key
            .add_source(Environment::with_prefix("BOT"))
            .build()?;

        // Deserialize entire configuration
        s.try_deserialize()
    }

    pub async fn save(&self) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let settings_path = std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string());

        if let Some(parent) = PathBuf::from(&settings_path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let mut file = tokio::fs::File::create(&settings_path).await?;
        file.write_all(
            serde_yaml::to_string(&self)
                .context("Failed to serialize settings")?
                .as_bytes(),
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }
}
