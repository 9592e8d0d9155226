use crate::task::Task;
use std::time::Duration;

const PING_INTERVAL: Duration = Duration::from_secs(300);

/// Pings the hosting platform's public url every five minutes so free-tier
/// hosts don't put the bot to sleep.
pub struct Keepalive {
    task: Task,
}

impl Keepalive {
    pub fn start(url: String) -> Self {
        let task = Task::spawn(async move {
            let client = match reqwest::Client::builder().build() {
                Ok(client) => client,
                Err(e) => {
                    log::error!("Failed to create keepalive client: {}", e);
                    return;
                }
            };

            loop {
                match client.get(&url).send().await {
                    Ok(response) => log::debug!("Keepalive ping: {}", response.status()),
                    Err(e) => log::warn!("Keepalive ping failed: {}", e),
                }
                tokio::time::sleep(PING_INTERVAL).await;
            }
        });

        Self { task }
    }

    pub async fn stop(self) {
        self.task.cancel().await;
    }
}
