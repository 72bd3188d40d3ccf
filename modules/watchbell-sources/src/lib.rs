pub mod anime;
pub mod manga;
pub mod outcome;
pub mod streaming;

pub use anime::AnilistAnimeSource;
pub use manga::MangaDexMangaSource;
pub use outcome::FetchOutcome;
pub use streaming::{
    FirstResultLinkSource, LinkOutcome, StreamingLinkResolver, StreamingLinkSource,
    TemplateLinkSource,
};

use async_trait::async_trait;
use watchbell_common::FetchedTitleState;

/// Anime catalog lookup. Implementations never panic past this boundary:
/// every failure mode is a `FetchOutcome` variant.
#[async_trait]
pub trait AnimeSource: Send + Sync {
    /// Current upstream state for a title.
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState>;
}

/// Manga catalog lookup. Same contract as [`AnimeSource`].
#[async_trait]
pub trait MangaSource: Send + Sync {
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState>;
}
