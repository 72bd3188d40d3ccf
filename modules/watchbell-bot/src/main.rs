use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use watchbell_common::{Config, WatchbellError};
use watchbell_engine::{Dispatcher, Pacing, Reconciler};
use watchbell_sources::{
    AnilistAnimeSource, AnimeSource, MangaDexMangaSource, MangaSource, StreamingLinkResolver,
};
use watchbell_store::{MemoryStore, PostgresStore, SubscriptionStore};

use watchbell_bot::commands::CommandHandler;
use watchbell_bot::sender::DiscordSender;
use watchbell_bot::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("watchbell=info".parse()?))
        .init();

    info!("Watchbell starting...");

    let config = Config::from_env();
    config.log_redacted();

    let store: Arc<dyn SubscriptionStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, subscriptions will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    let anime: Arc<dyn AnimeSource> = Arc::new(AnilistAnimeSource::new(&config.anilist_url));
    let manga: Arc<dyn MangaSource> = Arc::new(MangaDexMangaSource::new(&config.mangadex_url));
    let links = Arc::new(StreamingLinkResolver::with_default_sources());
    let dispatcher = Dispatcher::new(Arc::new(DiscordSender::new(&config.bot_token)));

    let reconciler = Reconciler::new(
        store.clone(),
        anime.clone(),
        manga.clone(),
        links,
        dispatcher,
        Pacing::default(),
    );

    let commands = Arc::new(CommandHandler::new(store, anime, manga));

    // Liveness + inbound command server.
    let app = web::router(AppState { commands });
    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = addr.as_str(), "Web server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Web server exited");
        }
    });

    // Reconciliation loop. A tick that overruns the interval makes the
    // next one skip via the tick lock; nothing in a tick is fatal.
    let mut interval = tokio::time::interval(Duration::from_secs(config.tick_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        info!("Checking for updates...");
        match reconciler.tick().await {
            Ok(stats) => info!("{stats}"),
            Err(WatchbellError::TickInProgress) => {
                warn!("Previous tick still running, skipping this one");
            }
            Err(e) => error!(error = %e, "Tick failed, retrying next interval"),
        }
    }
}
