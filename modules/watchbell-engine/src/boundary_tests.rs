//! Engine boundary tests — MOCK → FUNCTION → OUTPUT.
//!
//! Set up mock sources/store/sender, run one tick, assert notifications
//! and persisted progress.

use std::sync::Arc;
use std::time::Duration;

use watchbell_common::{ChannelKind, WatchKind};
use watchbell_sources::{AnimeSource, FetchOutcome, MangaSource, TemplateLinkSource};
use watchbell_store::{MemoryStore, SubscriptionStore};

use crate::notify::Dispatcher;
use crate::reconcile::{Pacing, Reconciler};
use crate::testing::*;

struct Harness {
    store: Arc<MemoryStore>,
    anime: Arc<MockCatalog>,
    manga: Arc<MockCatalog>,
    sender: Arc<MockSender>,
    engine: Reconciler,
}

fn harness_with(anime: MockCatalog, manga: MockCatalog, sender: MockSender) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let anime = Arc::new(anime);
    let manga = Arc::new(manga);
    let sender = Arc::new(sender);
    let engine = Reconciler::new(
        store.clone() as Arc<dyn SubscriptionStore>,
        anime.clone() as Arc<dyn AnimeSource>,
        manga.clone() as Arc<dyn MangaSource>,
        Arc::new(resolver(vec![Box::new(TemplateLinkSource::new(
            "gogoanime",
            "https://gogoanime.gg",
        ))])),
        Dispatcher::new(sender.clone()),
        Pacing::none(),
    );
    Harness {
        store,
        anime,
        manga,
        sender,
        engine,
    }
}

async fn subscribe(
    store: &MemoryStore,
    user: &str,
    guild: &str,
    kind: WatchKind,
    title: &str,
    progress: f64,
    channel: Option<&str>,
) {
    let mut rec = store.find_or_create(user, guild).await.unwrap();
    rec.add_watch(kind, title, progress);
    if let Some(c) = channel {
        rec.set_channel(ChannelKind::Notification, c);
    }
    store.save(&rec).await.unwrap();
}

// ---------------------------------------------------------------------------
// Advance → notify → ratchet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anime_advance_notifies_and_ratchets() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 6.0, "https://anilist.co/anime/1")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 5.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();

    assert_eq!(stats.advances, 1);
    assert_eq!(stats.delivered, 1);

    let sent = h.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "c1");
    assert!(sent[0].1.contains("<@u1>"));
    assert!(sent[0].1.contains("**X**"));
    assert!(sent[0].1.contains("https://anilist.co/anime/1"));
    assert!(sent[0].1.contains("gogoanime: https://gogoanime.gg/x-episode-6"));

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 6.0);
}

#[tokio::test]
async fn no_advance_when_latest_equals_progress() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 5.0, "https://anilist.co/anime/1")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 5.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.advances, 0);
    assert!(h.sender.sent().is_empty());
}

#[tokio::test]
async fn second_tick_with_no_upstream_change_is_idempotent() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 6.0, "https://anilist.co/anime/1")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 5.0, Some("c1")).await;

    h.engine.tick().await.unwrap();
    let before = h.store.list_all().await.unwrap();

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.advances, 0, "no second notification");
    assert_eq!(h.sender.sent().len(), 1);

    let after = h.store.list_all().await.unwrap();
    assert_eq!(before[0].anime_watches, after[0].anime_watches, "store unchanged");
}

#[tokio::test]
async fn regressed_upstream_value_never_lowers_progress() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 8.0, "https://anilist.co/anime/1")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 10.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.advances, 0);
    assert!(h.sender.sent().is_empty());

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 10.0, "monotonic ratchet");
}

// ---------------------------------------------------------------------------
// Grouping: one fetch per unique title
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shared_manga_title_fetched_once_notifies_only_behind_subscriber() {
    let h = harness_with(
        MockCatalog::new(),
        MockCatalog::new().on_title("Y", fetched("Y", 5.0, "https://mangadex.org/chapter/abc")),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Manga, "Y", 3.0, Some("c1")).await;
    subscribe(&h.store, "u2", "g1", WatchKind::Manga, "y", 5.0, Some("c2")).await;

    let stats = h.engine.tick().await.unwrap();

    assert_eq!(h.manga.fetches_for("Y"), 1, "one fetch for two subscribers");
    assert_eq!(stats.advances, 1);
    let sent = h.sender.sent();
    assert_eq!(sent.len(), 1, "only the subscriber at chapter 3 is notified");
    assert!(sent[0].1.contains("<@u1>"));

    for rec in h.store.list_all().await.unwrap() {
        assert_eq!(rec.manga_watches[0].progress, 5.0);
    }
}

#[tokio::test]
async fn fetch_count_equals_distinct_normalized_titles() {
    let h = harness_with(
        MockCatalog::new()
            .on_title("A", fetched("A", 1.0, "https://a"))
            .on_title("B", fetched("B", 1.0, "https://b")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "A", 0.0, Some("c1")).await;
    subscribe(&h.store, "u2", "g1", WatchKind::Anime, " a ", 0.0, Some("c1")).await;
    subscribe(&h.store, "u3", "g1", WatchKind::Anime, "B", 0.0, Some("c1")).await;

    h.engine.tick().await.unwrap();
    assert_eq!(h.anime.fetches(), 2, "three subscriptions, two unique titles");
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_title_does_not_abort_siblings() {
    let h = harness_with(
        MockCatalog::new()
            .on_title("A", FetchOutcome::Transient("connection reset".to_string()))
            .on_title("B", fetched("B", 2.0, "https://b")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "A", 0.0, Some("c1")).await;
    subscribe(&h.store, "u2", "g1", WatchKind::Anime, "B", 1.0, Some("c2")).await;

    let stats = h.engine.tick().await.unwrap();

    assert_eq!(stats.titles_unavailable, 1);
    assert_eq!(stats.delivered, 1, "B's subscriber still notified");

    // A's progress is untouched this tick.
    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 0.0);
}

#[tokio::test]
async fn hung_adapter_call_is_transient_for_that_title_only() {
    let store = Arc::new(MemoryStore::new());
    let anime = Arc::new(
        MockCatalog::new()
            .hang_on_title("A")
            .on_title("B", fetched("B", 2.0, "https://b")),
    );
    let sender = Arc::new(MockSender::new());
    let engine = Reconciler::new(
        store.clone() as Arc<dyn SubscriptionStore>,
        anime.clone() as Arc<dyn AnimeSource>,
        Arc::new(MockCatalog::new()) as Arc<dyn MangaSource>,
        Arc::new(resolver(vec![Box::new(TemplateLinkSource::new(
            "gogoanime",
            "https://gogoanime.gg",
        ))])),
        Dispatcher::new(sender.clone()),
        Pacing {
            anime_jitter_ms: (0, 0),
            manga_jitter_ms: (0, 0),
            fetch_deadline: Duration::from_millis(50),
        },
    );
    subscribe(&store, "u1", "g1", WatchKind::Anime, "A", 0.0, Some("c1")).await;
    subscribe(&store, "u2", "g1", WatchKind::Anime, "B", 1.0, Some("c2")).await;

    let stats = engine.tick().await.unwrap();

    assert_eq!(stats.titles_unavailable, 1, "blown deadline counts as transient");
    assert_eq!(stats.delivered, 1, "B's subscriber still notified");

    let rec = store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 0.0, "hung title untouched this tick");
}

#[tokio::test]
async fn not_found_title_skipped_without_mutation() {
    let h = harness_with(MockCatalog::new(), MockCatalog::new(), MockSender::new());
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "Ghost Title", 3.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.titles_not_found, 1);
    assert!(h.sender.sent().is_empty());

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 3.0);
}

#[tokio::test]
async fn delivery_failure_still_advances_progress() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 6.0, "https://x")),
        MockCatalog::new(),
        MockSender::new().fail_channel("c1"),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 5.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.delivery_failures, 1);
    assert_eq!(stats.records_saved, 1);

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 6.0, "failed delivery is not retried");
}

#[tokio::test]
async fn no_channel_skips_notification_but_advances_progress() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 6.0, "https://x")),
        MockCatalog::new(),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 5.0, None).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.skipped_no_channel, 1);
    assert!(h.sender.sent().is_empty());

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 6.0);
}

#[tokio::test]
async fn dead_streaming_provider_marked_unavailable_others_present() {
    let store = Arc::new(MemoryStore::new());
    let anime = Arc::new(MockCatalog::new().on_title("X", fetched("X", 6.0, "https://x")));
    let sender = Arc::new(MockSender::new());
    let engine = Reconciler::new(
        store.clone() as Arc<dyn SubscriptionStore>,
        anime as Arc<dyn AnimeSource>,
        Arc::new(MockCatalog::new()) as Arc<dyn MangaSource>,
        Arc::new(resolver(vec![
            Box::new(DeadLinkSource::new("animesuge")),
            Box::new(TemplateLinkSource::new("gogoanime", "https://gogoanime.gg")),
        ])),
        Dispatcher::new(sender.clone()),
        Pacing::none(),
    );
    subscribe(&store, "u1", "g1", WatchKind::Anime, "X", 5.0, Some("c1")).await;

    engine.tick().await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 1, "notification still sends");
    assert!(sent[0].1.contains("animesuge: unavailable"));
    assert!(sent[0].1.contains("gogoanime: https://gogoanime.gg/x-episode-6"));
}

// ---------------------------------------------------------------------------
// Both passes in one tick
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anime_and_manga_passes_run_independently() {
    let h = harness_with(
        MockCatalog::new().on_title("X", fetched("X", 2.0, "https://x")),
        MockCatalog::new().on_title("Y", fetched("Y", 7.5, "https://y")),
        MockSender::new(),
    );
    subscribe(&h.store, "u1", "g1", WatchKind::Anime, "X", 1.0, Some("c1")).await;
    subscribe(&h.store, "u1", "g1", WatchKind::Manga, "Y", 7.0, Some("c1")).await;

    let stats = h.engine.tick().await.unwrap();
    assert_eq!(stats.advances, 2);
    assert_eq!(stats.delivered, 2);

    let rec = h.store.find("u1", "g1").await.unwrap().unwrap();
    assert_eq!(rec.anime_watches[0].progress, 2.0);
    assert_eq!(rec.manga_watches[0].progress, 7.5, "fractional chapters supported");
}
