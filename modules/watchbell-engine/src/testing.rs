//! Mock implementations of the engine's seams for deterministic tests:
//! no network, no database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use watchbell_common::{normalize_title, FetchedTitleState};
use watchbell_sources::{
    AnimeSource, FetchOutcome, LinkOutcome, MangaSource, StreamingLinkResolver,
    StreamingLinkSource,
};

use crate::notify::ChannelSender;

/// Canned catalog answering from a title → outcome map. Unregistered
/// titles come back `NotFound`. Records every fetch for call-count
/// assertions. Serves as both the anime and the manga source.
#[derive(Default)]
pub struct MockCatalog {
    states: HashMap<String, FetchOutcome<FetchedTitleState>>,
    hang: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_title(mut self, title: &str, outcome: FetchOutcome<FetchedTitleState>) -> Self {
        self.states.insert(normalize_title(title), outcome);
        self
    }

    /// Make a title's fetch hang far past any reasonable deadline.
    pub fn hang_on_title(mut self, title: &str) -> Self {
        self.hang.insert(normalize_title(title));
        self
    }

    pub fn fetches(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fetches_for(&self, title: &str) -> usize {
        let needle = normalize_title(title);
        self.calls.lock().unwrap().iter().filter(|t| **t == needle).count()
    }

    async fn answer(&self, title: &str) -> FetchOutcome<FetchedTitleState> {
        let key = normalize_title(title);
        self.calls.lock().unwrap().push(key.clone());
        if self.hang.contains(&key) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.states.get(&key).cloned().unwrap_or(FetchOutcome::NotFound)
    }
}

#[async_trait]
impl AnimeSource for MockCatalog {
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState> {
        self.answer(title).await
    }
}

#[async_trait]
impl MangaSource for MockCatalog {
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState> {
        self.answer(title).await
    }
}

/// Shorthand for a successful fetch outcome.
pub fn fetched(display_title: &str, latest: f64, url: &str) -> FetchOutcome<FetchedTitleState> {
    FetchOutcome::Ok(FetchedTitleState {
        display_title: display_title.to_string(),
        latest,
        url: url.to_string(),
    })
}

/// Records every sent message; channels registered as failing bail
/// instead.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_channel(mut self, channel_id: &str) -> Self {
        self.failing.insert(channel_id.to_string());
        self
    }

    /// `(channel_id, content)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for MockSender {
    async fn send(&self, channel_id: &str, content: &str) -> anyhow::Result<()> {
        if self.failing.contains(channel_id) {
            anyhow::bail!("channel {channel_id} unreachable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }
}

/// Provider that is always down. For partial-failure scenarios.
pub struct DeadLinkSource {
    name: String,
}

impl DeadLinkSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl StreamingLinkSource for DeadLinkSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn episode_link(&self, _title: &str, _episode: u32) -> LinkOutcome {
        LinkOutcome::Unavailable
    }
}

/// Resolver with the given sources and a short deadline.
pub fn resolver(sources: Vec<Box<dyn StreamingLinkSource>>) -> StreamingLinkResolver {
    StreamingLinkResolver::new(sources, Duration::from_millis(200))
}
