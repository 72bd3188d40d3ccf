use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

/// Result of asking one provider for an episode link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Available(String),
    Unavailable,
}

/// One streaming provider. Implementations must not raise: a provider
/// that cannot produce a link answers `Unavailable`.
#[async_trait]
pub trait StreamingLinkSource: Send + Sync {
    fn name(&self) -> &str;

    async fn episode_link(&self, title: &str, episode: u32) -> LinkOutcome;
}

/// Fans a link lookup out over every configured provider. Each provider
/// is independently fallible: a failure or a blown deadline marks that
/// provider `Unavailable` and never aborts the others.
pub struct StreamingLinkResolver {
    sources: Vec<Box<dyn StreamingLinkSource>>,
    per_source_deadline: Duration,
}

impl StreamingLinkResolver {
    pub fn new(sources: Vec<Box<dyn StreamingLinkSource>>, per_source_deadline: Duration) -> Self {
        Self {
            sources,
            per_source_deadline,
        }
    }

    /// The default provider set: a slug-template source plus scraped
    /// first-result sources.
    pub fn with_default_sources() -> Self {
        Self::new(
            vec![
                Box::new(TemplateLinkSource::new(
                    "gogoanime",
                    "https://gogoanime.gg",
                )),
                Box::new(FirstResultLinkSource::new(
                    "animesuge",
                    "https://animesuge.to/filter",
                    "keyword",
                    ".film-list .item a.name",
                )),
                Box::new(FirstResultLinkSource::new(
                    "aniwave",
                    "https://aniwave.to/filter",
                    "keyword",
                    ".film-list .inner a.name",
                )),
            ],
            Duration::from_secs(10),
        )
    }

    /// Look up `title` episode `episode` on every provider, in order.
    pub async fn links(&self, title: &str, episode: u32) -> Vec<(String, LinkOutcome)> {
        let mut out = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let outcome =
                match tokio::time::timeout(self.per_source_deadline, source.episode_link(title, episode))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(source = source.name(), title, "Streaming link lookup timed out");
                        LinkOutcome::Unavailable
                    }
                };
            out.push((source.name().to_string(), outcome));
        }
        out
    }
}

/// Slugged-URL provider: builds the episode URL from a template with no
/// network call. Always structurally succeeds (the URL itself may 404).
pub struct TemplateLinkSource {
    name: String,
    base: String,
}

impl TemplateLinkSource {
    pub fn new(name: &str, base: &str) -> Self {
        Self {
            name: name.to_string(),
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StreamingLinkSource for TemplateLinkSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn episode_link(&self, title: &str, episode: u32) -> LinkOutcome {
        LinkOutcome::Available(format!("{}/{}-episode-{episode}", self.base, slugify(title)))
    }
}

/// Scraped provider: runs the site search and extracts the first result
/// link. Selectors are per-site and fragile, so every failure path is
/// absorbed into `Unavailable`.
pub struct FirstResultLinkSource {
    name: String,
    search_url: String,
    query_param: String,
    result_selector: String,
    client: reqwest::Client,
}

impl FirstResultLinkSource {
    pub fn new(name: &str, search_url: &str, query_param: &str, result_selector: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            name: name.to_string(),
            search_url: search_url.to_string(),
            query_param: query_param.to_string(),
            result_selector: result_selector.to_string(),
            client,
        }
    }

    async fn first_result(&self, query: &str) -> Option<String> {
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[(self.query_param.as_str(), query)])
            .send()
            .await
            .ok()?;

        if !resp.status().is_success() {
            warn!(source = self.name.as_str(), status = %resp.status(), "Search returned non-success");
            return None;
        }

        let html = resp.text().await.ok()?;
        extract_first_href(&html, &self.result_selector, &self.search_url)
    }
}

#[async_trait]
impl StreamingLinkSource for FirstResultLinkSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn episode_link(&self, title: &str, episode: u32) -> LinkOutcome {
        let query = format!("{title} episode {episode}");
        match self.first_result(&query).await {
            Some(url) => LinkOutcome::Available(url),
            None => LinkOutcome::Unavailable,
        }
    }
}

/// Pull the first matching href out of a search results page, resolving
/// relative links against the page URL.
fn extract_first_href(html: &str, selector: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => {
            warn!(selector, "Invalid result selector");
            return None;
        }
    };

    let href = doc.select(&sel).next()?.value().attr("href")?;
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Lowercase, alphanumerics kept, everything else collapsed to single dashes.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
