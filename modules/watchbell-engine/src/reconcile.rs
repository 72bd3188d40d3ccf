use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use watchbell_common::{FetchedTitleState, WatchKind, WatchbellError};
use watchbell_sources::{
    AnimeSource, FetchOutcome, LinkOutcome, MangaSource, StreamingLinkResolver,
};
use watchbell_store::SubscriptionStore;

use crate::aggregator::{group, GroupEntry};
use crate::lock::TickLock;
use crate::notify::{Delivery, Dispatcher};

/// Rate-limiting knobs for a tick. Fetches within a pass are sequential
/// with a randomized delay before each one so the bot never bursts an
/// upstream. Injectable so tests run with zero delay.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Millisecond jitter range before each anime fetch.
    pub anime_jitter_ms: (u64, u64),
    /// Millisecond jitter range before each manga fetch.
    pub manga_jitter_ms: (u64, u64),
    /// Deadline for a single adapter call; expiry counts as a transient
    /// failure for that title only.
    pub fetch_deadline: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            anime_jitter_ms: (500, 1000),
            manga_jitter_ms: (300, 600),
            fetch_deadline: Duration::from_secs(20),
        }
    }
}

impl Pacing {
    /// No delays, short deadline. For tests.
    pub fn none() -> Self {
        Self {
            anime_jitter_ms: (0, 0),
            manga_jitter_ms: (0, 0),
            fetch_deadline: Duration::from_secs(5),
        }
    }
}

/// Stats from one reconciliation tick.
#[derive(Debug, Default)]
pub struct TickStats {
    pub titles_checked: u32,
    pub titles_not_found: u32,
    pub titles_unavailable: u32,
    pub advances: u32,
    pub delivered: u32,
    pub skipped_no_channel: u32,
    pub delivery_failures: u32,
    pub records_saved: u32,
}

impl std::fmt::Display for TickStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Tick Complete ===")?;
        writeln!(f, "Titles checked:     {}", self.titles_checked)?;
        writeln!(f, "  not found:        {}", self.titles_not_found)?;
        writeln!(f, "  unavailable:      {}", self.titles_unavailable)?;
        writeln!(f, "Advances:           {}", self.advances)?;
        writeln!(f, "  delivered:        {}", self.delivered)?;
        writeln!(f, "  no channel:       {}", self.skipped_no_channel)?;
        writeln!(f, "  delivery failed:  {}", self.delivery_failures)?;
        writeln!(f, "Records saved:      {}", self.records_saved)?;
        Ok(())
    }
}

/// The reconciliation engine. One `tick()` snapshots all subscriptions,
/// groups them by normalized title, fetches each unique title once, and
/// applies the compare/notify/persist state machine per subscriber.
///
/// Failure isolation is the design's backbone: a dead upstream title, a
/// misconfigured subscriber, or a failed delivery never aborts siblings,
/// and nothing here is fatal to the scheduler.
pub struct Reconciler {
    store: Arc<dyn SubscriptionStore>,
    anime: Arc<dyn AnimeSource>,
    manga: Arc<dyn MangaSource>,
    links: Arc<StreamingLinkResolver>,
    dispatcher: Dispatcher,
    lock: TickLock,
    pacing: Pacing,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        anime: Arc<dyn AnimeSource>,
        manga: Arc<dyn MangaSource>,
        links: Arc<StreamingLinkResolver>,
        dispatcher: Dispatcher,
        pacing: Pacing,
    ) -> Self {
        Self {
            store,
            anime,
            manga,
            links,
            dispatcher,
            lock: TickLock::new(),
            pacing,
        }
    }

    /// Run one tick. Returns `WatchbellError::TickInProgress` if the
    /// previous tick is still running; the caller skips, never queues.
    pub async fn tick(&self) -> Result<TickStats, WatchbellError> {
        let _guard = self.lock.try_acquire().ok_or(WatchbellError::TickInProgress)?;

        let mut stats = TickStats::default();
        self.run_pass(WatchKind::Anime, &mut stats).await?;
        self.run_pass(WatchKind::Manga, &mut stats).await?;

        info!(
            titles = stats.titles_checked,
            advances = stats.advances,
            delivered = stats.delivered,
            "Reconciliation tick complete"
        );
        Ok(stats)
    }

    async fn run_pass(&self, kind: WatchKind, stats: &mut TickStats) -> Result<(), WatchbellError> {
        let records = self
            .store
            .list_all()
            .await
            .map_err(|e| WatchbellError::Store(e.to_string()))?;
        let groups = group(&records, kind);
        debug!(%kind, records = records.len(), groups = groups.len(), "Pass start");

        for (normalized_title, title_group) in groups {
            self.jitter(kind).await;
            stats.titles_checked += 1;

            let state = match self.fetch_with_deadline(kind, &title_group.query_title).await {
                FetchOutcome::Ok(state) => state,
                FetchOutcome::NotFound => {
                    debug!(%kind, title = normalized_title.as_str(), "No upstream match, skipping");
                    stats.titles_not_found += 1;
                    continue;
                }
                FetchOutcome::Transient(reason) => {
                    warn!(
                        %kind,
                        title = normalized_title.as_str(),
                        reason = reason.as_str(),
                        "Upstream unavailable, skipping title this tick"
                    );
                    stats.titles_unavailable += 1;
                    continue;
                }
            };

            for entry in &title_group.entries {
                if let Err(e) = self
                    .process_entry(kind, &normalized_title, entry, &state, stats)
                    .await
                {
                    warn!(
                        user_id = entry.user_id.as_str(),
                        guild_id = entry.guild_id.as_str(),
                        title = normalized_title.as_str(),
                        error = %e,
                        "Subscriber processing failed, continuing with siblings"
                    );
                }
            }
        }

        Ok(())
    }

    /// The per-subscriber state machine: notify on a strict advance, then
    /// ratchet and persist regardless of how dispatch went.
    async fn process_entry(
        &self,
        kind: WatchKind,
        normalized_title: &str,
        entry: &GroupEntry,
        state: &FetchedTitleState,
        stats: &mut TickStats,
    ) -> anyhow::Result<()> {
        // Strict `>`: equal or regressed upstream values never re-trigger.
        if state.latest <= entry.progress {
            return Ok(());
        }
        stats.advances += 1;

        let body = self.compose_body(kind, state).await;
        match self
            .dispatcher
            .notify(
                entry.channel_id.as_deref(),
                &entry.user_id,
                kind,
                &state.display_title,
                &body,
            )
            .await
        {
            Delivery::Delivered => stats.delivered += 1,
            Delivery::Skipped => stats.skipped_no_channel += 1,
            Delivery::Failed(_) => stats.delivery_failures += 1,
        }

        // Progress advances whether or not the message went out: a failed
        // delivery is not retried next tick. Re-read before mutating so a
        // concurrent command's save of this record is not clobbered.
        let mut record = self
            .store
            .find_or_create(&entry.user_id, &entry.guild_id)
            .await?;
        if record.advance_watch(kind, normalized_title, state.latest) {
            self.store.save(&record).await?;
            stats.records_saved += 1;
        }
        Ok(())
    }

    async fn compose_body(&self, kind: WatchKind, state: &FetchedTitleState) -> String {
        match kind {
            WatchKind::Manga => state.url.clone(),
            WatchKind::Anime => {
                let mut body = state.url.clone();
                let episode = state.latest as u32;
                for (name, outcome) in self.links.links(&state.display_title, episode).await {
                    match outcome {
                        LinkOutcome::Available(url) => body.push_str(&format!("\n{name}: {url}")),
                        LinkOutcome::Unavailable => body.push_str(&format!("\n{name}: unavailable")),
                    }
                }
                body
            }
        }
    }

    async fn fetch_with_deadline(
        &self,
        kind: WatchKind,
        title: &str,
    ) -> FetchOutcome<FetchedTitleState> {
        let fetch = async {
            match kind {
                WatchKind::Anime => self.anime.latest(title).await,
                WatchKind::Manga => self.manga.latest(title).await,
            }
        };
        match tokio::time::timeout(self.pacing.fetch_deadline, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Transient("adapter deadline exceeded".to_string()),
        }
    }

    async fn jitter(&self, kind: WatchKind) {
        let (lo, hi) = match kind {
            WatchKind::Anime => self.pacing.anime_jitter_ms,
            WatchKind::Manga => self.pacing.manga_jitter_ms,
        };
        if hi == 0 {
            return;
        }
        let ms = rand::rng().random_range(lo..=hi);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
