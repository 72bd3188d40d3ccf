use async_trait::async_trait;

use mangadex_client::{MangaDexClient, MangaSummary};
use watchbell_common::{normalize_title, FetchedTitleState};

use crate::outcome::FetchOutcome;
use crate::MangaSource;

/// MangaDex-backed manga adapter.
pub struct MangaDexMangaSource {
    client: MangaDexClient,
    /// Reader site used to build chapter URLs.
    site: String,
}

impl MangaDexMangaSource {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: MangaDexClient::new(api_url),
            site: "https://mangadex.org".to_string(),
        }
    }
}

/// Candidate selection: exact case-insensitive title match wins, else the
/// first (most relevant) search result.
fn pick_candidate(candidates: Vec<MangaSummary>, searched: &str) -> Option<MangaSummary> {
    let needle = normalize_title(searched);
    let exact = candidates
        .iter()
        .position(|c| normalize_title(&c.title) == needle);
    match exact {
        Some(i) => candidates.into_iter().nth(i),
        None => candidates.into_iter().next(),
    }
}

#[async_trait]
impl MangaSource for MangaDexMangaSource {
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState> {
        let candidates = match self.client.search_manga(title).await {
            Ok(c) => c,
            Err(e) => return FetchOutcome::Transient(e.to_string()),
        };

        let manga = match pick_candidate(candidates, title) {
            Some(m) => m,
            None => return FetchOutcome::NotFound,
        };

        let pick = match self.client.latest_chapter(&manga.id).await {
            Ok(Some(pick)) => pick,
            // A manga with no numbered chapters has nothing to notify about.
            Ok(None) => return FetchOutcome::NotFound,
            Err(e) => return FetchOutcome::Transient(e.to_string()),
        };

        let display_title = if manga.title.is_empty() {
            title.to_string()
        } else {
            manga.title
        };

        FetchOutcome::Ok(FetchedTitleState {
            display_title,
            latest: pick.number,
            url: pick.url(&self.site),
        })
    }
}
