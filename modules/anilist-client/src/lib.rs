pub mod error;

pub use error::{AnilistError, Result};

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

const MEDIA_QUERY: &str = "\
query ($search: String) {
  Media(search: $search, type: ANIME) {
    title { romaji english }
    episodes
    siteUrl
    nextAiringEpisode { episode }
  }
}";

/// Backoff applied once when AniList answers 429.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

pub struct AnilistClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimeMedia {
    pub title: MediaTitle,
    pub episodes: Option<u32>,
    #[serde(rename = "siteUrl")]
    pub site_url: String,
    #[serde(rename = "nextAiringEpisode")]
    pub next_airing_episode: Option<AiringEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiringEpisode {
    pub episode: u32,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<MediaData>,
}

#[derive(Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AnimeMedia>,
}

impl AnimeMedia {
    /// Preferred display title: English if present, else romaji.
    pub fn display_title(&self) -> &str {
        self.title
            .english
            .as_deref()
            .or(self.title.romaji.as_deref())
            .unwrap_or("")
    }
}

impl AnilistClient {
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Search for an anime by title. `Ok(None)` means AniList has no match.
    ///
    /// A 429 answer triggers a single 2-second backoff and retry; a second
    /// 429 surfaces as `AnilistError::RateLimited`.
    pub async fn search_anime(&self, title: &str) -> Result<Option<AnimeMedia>> {
        match self.query(title).await {
            Err(AnilistError::Api { status: 429, .. }) => {
                warn!(title, "AniList rate limit hit, backing off once");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                match self.query(title).await {
                    Err(AnilistError::Api { status: 429, .. }) => Err(AnilistError::RateLimited),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn query(&self, title: &str) -> Result<Option<AnimeMedia>> {
        let body = serde_json::json!({
            "query": MEDIA_QUERY,
            "variables": { "search": title },
        });

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        // AniList answers "no match" with a 404 wrapped in a GraphQL error body.
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AnilistError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| AnilistError::Decode(e.to_string()))?;

        Ok(parsed.data.and_then(|d| d.media))
    }
}
