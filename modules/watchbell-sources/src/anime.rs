use async_trait::async_trait;
use tracing::warn;

use anilist_client::{AnilistClient, AnilistError};
use watchbell_common::FetchedTitleState;

use crate::outcome::FetchOutcome;
use crate::AnimeSource;

/// AniList-backed anime adapter.
pub struct AnilistAnimeSource {
    client: AnilistClient,
}

impl AnilistAnimeSource {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: AnilistClient::new(endpoint),
        }
    }
}

/// Latest released episode: one before the next airing episode when a
/// schedule is known, else the total episode count (finished shows),
/// else 0.
fn latest_episode(episodes: Option<u32>, next_airing: Option<u32>) -> u32 {
    match next_airing {
        Some(next) => next.saturating_sub(1),
        None => episodes.unwrap_or(0),
    }
}

#[async_trait]
impl AnimeSource for AnilistAnimeSource {
    async fn latest(&self, title: &str) -> FetchOutcome<FetchedTitleState> {
        let media = match self.client.search_anime(title).await {
            Ok(Some(media)) => media,
            Ok(None) => return FetchOutcome::NotFound,
            Err(AnilistError::RateLimited) => {
                warn!(title, "AniList still rate limited after retry");
                return FetchOutcome::Transient("rate limited".to_string());
            }
            Err(e) => return FetchOutcome::Transient(e.to_string()),
        };

        let latest = latest_episode(
            media.episodes,
            media.next_airing_episode.as_ref().map(|a| a.episode),
        );
        let display_title = match media.display_title() {
            "" => title.to_string(),
            t => t.to_string(),
        };

        FetchOutcome::Ok(FetchedTitleState {
            display_title,
            latest: latest as f64,
            url: media.site_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airing_show_is_one_behind_next_episode() {
        assert_eq!(latest_episode(None, Some(12)), 11);
        assert_eq!(latest_episode(Some(24), Some(12)), 11);
    }

    #[test]
    fn finished_show_falls_back_to_total_count() {
        assert_eq!(latest_episode(Some(24), None), 24);
    }

    #[test]
    fn unknown_schedule_yields_zero() {
        assert_eq!(latest_episode(None, None), 0);
    }

    #[test]
    fn next_episode_zero_does_not_underflow() {
        assert_eq!(latest_episode(None, Some(0)), 0);
    }
}
