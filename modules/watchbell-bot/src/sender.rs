use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use watchbell_engine::ChannelSender;

/// Posts messages through the Discord REST API. The gateway connection
/// itself (inbound events, auth handshake) lives outside this crate;
/// delivery only needs the channel-message endpoint.
pub struct DiscordSender {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordSender {
    pub fn new(token: &str) -> Self {
        Self::with_api_base(token, "https://discord.com/api/v10")
    }

    pub fn with_api_base(token: &str, api_base: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl ChannelSender for DiscordSender {
    async fn send(&self, channel_id: &str, content: &str) -> anyhow::Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(channel_id, status = %status, body = %body, "Message send returned non-success");
            anyhow::bail!("message send returned {status}");
        }

        Ok(())
    }
}
