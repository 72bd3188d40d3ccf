pub mod error;

pub use error::{MangaDexError, Result};

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// How many recent chapters to inspect when picking the latest release.
/// Large enough to find an English translation of the newest number when
/// several languages publish around the same time.
const CHAPTER_FEED_LIMIT: u32 = 20;

pub struct MangaDexClient {
    client: reqwest::Client,
    base_url: String,
}

/// One manga candidate from a title search.
#[derive(Debug, Clone)]
pub struct MangaSummary {
    pub id: String,
    pub title: String,
}

/// The chapter chosen as "latest" for a manga.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPick {
    pub chapter_id: String,
    pub number: f64,
    pub language: String,
}

impl ChapterPick {
    /// Reader URL for this chapter, annotated when it is not the English
    /// release.
    pub fn url(&self, site: &str) -> String {
        let base = format!("{site}/chapter/{}", self.chapter_id);
        if self.language == "en" {
            base
        } else {
            format!("{base} ({} release)", self.language)
        }
    }
}

#[derive(Deserialize)]
struct CollectionResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct MangaEntity {
    id: String,
    attributes: MangaAttributes,
}

#[derive(Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ChapterEntity {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Deserialize)]
struct ChapterAttributes {
    chapter: Option<String>,
    #[serde(rename = "translatedLanguage")]
    translated_language: Option<String>,
}

impl MangaDexClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search manga by title. Candidates come back in API relevance order.
    pub async fn search_manga(&self, title: &str) -> Result<Vec<MangaSummary>> {
        let url = format!("{}/manga", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("title", title)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(title, status = status.as_u16(), "Manga search returned non-success");
            return Err(MangaDexError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CollectionResponse<MangaEntity> = resp
            .json()
            .await
            .map_err(|e| MangaDexError::Decode(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|m| {
                let title = m
                    .attributes
                    .title
                    .get("en")
                    .or_else(|| m.attributes.title.get("ja-ro"))
                    .cloned()
                    .or_else(|| m.attributes.title.values().next().cloned())
                    .unwrap_or_default();
                MangaSummary { id: m.id, title }
            })
            .collect())
    }

    /// Latest released chapter for a manga, by numeric chapter value.
    /// Among chapters sharing the newest number, the English release wins;
    /// otherwise whatever language is available is returned.
    pub async fn latest_chapter(&self, manga_id: &str) -> Result<Option<ChapterPick>> {
        let url = format!("{}/chapter", self.base_url);
        let limit = CHAPTER_FEED_LIMIT.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("manga", manga_id),
                ("order[chapter]", "desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(manga_id, status = status.as_u16(), "Chapter feed returned non-success");
            return Err(MangaDexError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CollectionResponse<ChapterEntity> = resp
            .json()
            .await
            .map_err(|e| MangaDexError::Decode(e.to_string()))?;

        Ok(pick_latest(parsed.data))
    }
}

/// Chapter selection policy: highest numeric chapter wins, English
/// preferred among equal numbers. Chapters without a parseable number
/// (oneshots, extras with no numbering) are ignored.
fn pick_latest(chapters: Vec<ChapterEntity>) -> Option<ChapterPick> {
    let mut best: Option<ChapterPick> = None;

    for ch in chapters {
        let number = match ch.attributes.chapter.as_deref().and_then(|c| c.parse::<f64>().ok()) {
            Some(n) => n,
            None => continue,
        };
        let language = ch
            .attributes
            .translated_language
            .unwrap_or_else(|| "unknown".to_string());
        let candidate = ChapterPick {
            chapter_id: ch.id,
            number,
            language,
        };

        best = match best {
            None => Some(candidate),
            Some(current) => {
                if candidate.number > current.number
                    || (candidate.number == current.number
                        && candidate.language == "en"
                        && current.language != "en")
                {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }

    best
}
