use crate::settings::Settings;
use crate::store::{ContentStore, RemoteDocument, StoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;

const USER_AGENT: &str = concat!("wardbot/", env!("CARGO_PKG_VERSION"));

/// [`ContentStore`] backed by the GitHub Contents API.
///
/// The document lives as one file in a data repository; GitHub's blob `sha`
/// is the version token.
pub struct GithubContents {
    client: reqwest::Client,
    url: String,
    branch: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

impl GithubContents {
    pub fn new(settings: &Settings) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        let auth = HeaderValue::from_str(&format!("token {}", settings.github_token))
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "https://api.github.com/repos/{}/{}/contents/{}",
                settings.github_user, settings.github_repo, settings.data_file
            ),
            branch: settings.branch.clone(),
        })
    }
}

#[async_trait]
impl ContentStore for GithubContents {
    async fn fetch(&self) -> Result<Option<RemoteDocument>, StoreError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ContentsResponse = response
                    .json()
                    .await
                    .map_err(|e| StoreError::Transport(e.to_string()))?;
                // GitHub wraps base64 payloads at 60 columns.
                let encoded: String = body
                    .content
                    .unwrap_or_default()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let content = BASE64
                    .decode(encoded)
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(Some(RemoteDocument {
                    content,
                    token: body.sha,
                }))
            }
            status => Err(StoreError::Status(status.as_u16())),
        }
    }

    async fn put(
        &self,
        content: &[u8],
        message: &str,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut payload = serde_json::json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = token {
            payload["sha"] = serde_json::Value::from(sha);
        }

        let response = self
            .client
            .put(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // 409: sha didn't match. 422: missing sha for an existing file.
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(StoreError::Conflict),
            status => Err(StoreError::Status(status.as_u16())),
        }
    }
}
