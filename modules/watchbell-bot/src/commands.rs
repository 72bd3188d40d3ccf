//! Text-command layer. The chat gateway delivers parsed message text
//! here; replies go back as plain strings. Everything stateful flows
//! through the subscription store's mutation contract.

use std::sync::Arc;

use tracing::{debug, info};

use watchbell_common::{AddWatch, ChannelKind, WatchKind};
use watchbell_sources::{AnimeSource, FetchOutcome, MangaSource};
use watchbell_store::SubscriptionStore;

const HELP_TEXT: &str = "\
**Watchbell commands**
`notify_anime <name>` — subscribe to new-episode notifications
`notify_manga <name>` — subscribe to new-chapter notifications
`stop_anime <name>` — unsubscribe from an anime
`stop_manga <name>` — unsubscribe from a manga
`my_subscriptions` — list what you're watching
`get_anime <name>` — look up an anime
`get_manga <name>` — look up a manga
`setchannel <channel-id>` — only accept commands in this channel
`setnotificationchannel <channel-id>` — send notifications to this channel";

/// Where a command came from.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
}

pub struct CommandHandler {
    store: Arc<dyn SubscriptionStore>,
    anime: Arc<dyn AnimeSource>,
    manga: Arc<dyn MangaSource>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        anime: Arc<dyn AnimeSource>,
        manga: Arc<dyn MangaSource>,
    ) -> Self {
        Self { store, anime, manga }
    }

    /// Handle one command. `None` means the message was silently ignored
    /// (command sent outside the configured command channel).
    pub async fn handle(&self, ctx: &CommandContext, input: &str) -> anyhow::Result<Option<String>> {
        // Subscriber records are created lazily on first contact,
        // inheriting the guild's channel configuration.
        let record = self
            .store
            .find_or_create(&ctx.user_id, &ctx.guild_id)
            .await?;

        if let Some(command_channel) = &record.command_channel {
            if *command_channel != ctx.channel_id {
                debug!(
                    user_id = ctx.user_id.as_str(),
                    expected = command_channel.as_str(),
                    got = ctx.channel_id.as_str(),
                    "Command from wrong channel, ignoring"
                );
                return Ok(None);
            }
        }

        let mut parts = input.trim().split_whitespace();
        let command = match parts.next() {
            Some(c) => c.to_lowercase(),
            None => return Ok(Some("Hi! Type `help` to see what I can do.".to_string())),
        };
        let arg = parts.collect::<Vec<_>>().join(" ");

        let reply = match command.as_str() {
            "help" | "h" => HELP_TEXT.to_string(),
            "notify_anime" => self.subscribe(ctx, WatchKind::Anime, &arg).await?,
            "notify_manga" => self.subscribe(ctx, WatchKind::Manga, &arg).await?,
            "stop_anime" => self.unsubscribe(ctx, WatchKind::Anime, &arg).await?,
            "stop_manga" => self.unsubscribe(ctx, WatchKind::Manga, &arg).await?,
            "my_subscriptions" => list_subscriptions(&record),
            "get_anime" => self.lookup(WatchKind::Anime, &arg).await,
            "get_manga" => self.lookup(WatchKind::Manga, &arg).await,
            "setchannel" => self.set_channel(ctx, ChannelKind::Command, &arg).await?,
            "setnotificationchannel" => {
                self.set_channel(ctx, ChannelKind::Notification, &arg).await?
            }
            other => format!("Unknown command: `{other}`\nTry `help` to see what I can do."),
        };
        Ok(Some(reply))
    }

    /// Subscribe to a title. Progress starts at the currently latest
    /// release so only future releases notify.
    async fn subscribe(
        &self,
        ctx: &CommandContext,
        kind: WatchKind,
        name: &str,
    ) -> anyhow::Result<String> {
        if name.is_empty() {
            return Ok(format!("Usage: `notify_{kind} <name>`"));
        }

        let state = match self.fetch(kind, name).await {
            FetchOutcome::Ok(state) => state,
            FetchOutcome::NotFound => return Ok(format!("{} not found.", capitalize(kind))),
            FetchOutcome::Transient(_) => {
                return Ok(format!("{} lookup failed, try again later.", capitalize(kind)))
            }
        };

        // Re-read before mutating: the lookup above can take seconds and
        // a tick may have saved this record in the meantime.
        let mut record = self
            .store
            .find_or_create(&ctx.user_id, &ctx.guild_id)
            .await?;
        match record.add_watch(kind, state.display_title.clone(), state.latest) {
            AddWatch::Added => {
                self.store.save(&record).await?;
                info!(
                    user_id = ctx.user_id.as_str(),
                    title = state.display_title.as_str(),
                    %kind,
                    "Subscription added"
                );
                Ok(format!("Subscribed to {} {kind} updates.", state.display_title))
            }
            AddWatch::AlreadyWatching => {
                Ok(format!("Already subscribed to {}.", state.display_title))
            }
        }
    }

    async fn unsubscribe(
        &self,
        ctx: &CommandContext,
        kind: WatchKind,
        name: &str,
    ) -> anyhow::Result<String> {
        if name.is_empty() {
            return Ok(format!("Usage: `stop_{kind} <name>`"));
        }

        let mut record = self
            .store
            .find_or_create(&ctx.user_id, &ctx.guild_id)
            .await?;
        if record.remove_watch(kind, name) {
            self.store.save(&record).await?;
            Ok(format!("Unsubscribed from {name}."))
        } else {
            Ok(format!("You're not subscribed to {name}."))
        }
    }

    async fn lookup(&self, kind: WatchKind, name: &str) -> String {
        if name.is_empty() {
            return format!("Usage: `get_{kind} <name>`");
        }
        match self.fetch(kind, name).await {
            FetchOutcome::Ok(state) => format!(
                "**{}** — latest {} {}\n{}",
                state.display_title,
                kind.unit(),
                state.latest,
                state.url
            ),
            FetchOutcome::NotFound => format!("{} not found.", capitalize(kind)),
            FetchOutcome::Transient(_) => {
                format!("{} lookup failed, try again later.", capitalize(kind))
            }
        }
    }

    async fn set_channel(
        &self,
        ctx: &CommandContext,
        kind: ChannelKind,
        channel_id: &str,
    ) -> anyhow::Result<String> {
        if channel_id.is_empty() {
            let usage = match kind {
                ChannelKind::Command => "Usage: `setchannel <channel-id>`",
                ChannelKind::Notification => "Usage: `setnotificationchannel <channel-id>`",
            };
            return Ok(usage.to_string());
        }

        let mut record = self
            .store
            .find_or_create(&ctx.user_id, &ctx.guild_id)
            .await?;
        record.set_channel(kind, channel_id);
        let reply = match kind {
            ChannelKind::Command => {
                // Setting the command channel also becomes the notification
                // channel until one is chosen explicitly.
                if record.notification_channel.is_none() {
                    record.set_channel(ChannelKind::Notification, channel_id);
                }
                format!("Commands will now only be accepted in <#{channel_id}>.")
            }
            ChannelKind::Notification => {
                format!("Notifications will now be sent to <#{channel_id}>.")
            }
        };
        self.store.save(&record).await?;
        Ok(reply)
    }

    async fn fetch(&self, kind: WatchKind, name: &str) -> FetchOutcome<watchbell_common::FetchedTitleState> {
        match kind {
            WatchKind::Anime => self.anime.latest(name).await,
            WatchKind::Manga => self.manga.latest(name).await,
        }
    }
}

fn list_subscriptions(record: &watchbell_common::SubscriberRecord) -> String {
    let render = |entries: &[watchbell_common::WatchEntry]| {
        if entries.is_empty() {
            "None".to_string()
        } else {
            entries
                .iter()
                .map(|w| w.title.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    format!(
        "**Your subscriptions**\nAnime: {}\nManga: {}",
        render(&record.anime_watches),
        render(&record.manga_watches)
    )
}

fn capitalize(kind: WatchKind) -> &'static str {
    match kind {
        WatchKind::Anime => "Anime",
        WatchKind::Manga => "Manga",
    }
}
