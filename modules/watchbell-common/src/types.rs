use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which watch set a title lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    Anime,
    Manga,
}

impl WatchKind {
    /// The unit of progress for this kind ("episode" / "chapter").
    pub fn unit(&self) -> &'static str {
        match self {
            WatchKind::Anime => "episode",
            WatchKind::Manga => "chapter",
        }
    }
}

impl std::fmt::Display for WatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchKind::Anime => write!(f, "anime"),
            WatchKind::Manga => write!(f, "manga"),
        }
    }
}

/// One tracked title plus the subscriber's last-known progress.
///
/// Progress is an f64 for both kinds: episodes are always integral, but
/// manga chapters can be fractional (10.5 extras and the like).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub title: String,
    pub progress: f64,
}

/// Outcome of adding a watch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddWatch {
    Added,
    AlreadyWatching,
}

/// Which channel slot to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Notification,
    Command,
}

/// One subscriber's state in one guild. `(user_id, guild_id)` is the
/// natural key: the same user has independent state per guild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default)]
    pub anime_watches: Vec<WatchEntry>,
    #[serde(default)]
    pub manga_watches: Vec<WatchEntry>,
    pub notification_channel: Option<String>,
    pub command_channel: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubscriberRecord {
    pub fn new(user_id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            guild_id: guild_id.into(),
            anime_watches: Vec::new(),
            manga_watches: Vec::new(),
            notification_channel: None,
            command_channel: None,
            created_at: Utc::now(),
        }
    }

    pub fn watches(&self, kind: WatchKind) -> &[WatchEntry] {
        match kind {
            WatchKind::Anime => &self.anime_watches,
            WatchKind::Manga => &self.manga_watches,
        }
    }

    pub fn watches_mut(&mut self, kind: WatchKind) -> &mut Vec<WatchEntry> {
        match kind {
            WatchKind::Anime => &mut self.anime_watches,
            WatchKind::Manga => &mut self.manga_watches,
        }
    }

    /// Case-insensitive lookup within one watch set.
    pub fn find_watch(&self, kind: WatchKind, title: &str) -> Option<&WatchEntry> {
        let needle = normalize_title(title);
        self.watches(kind)
            .iter()
            .find(|w| normalize_title(&w.title) == needle)
    }

    /// Add a watch entry. Duplicate titles (case-insensitive) within the
    /// same set are rejected without touching the record.
    pub fn add_watch(
        &mut self,
        kind: WatchKind,
        title: impl Into<String>,
        initial_progress: f64,
    ) -> AddWatch {
        let title = title.into();
        if self.find_watch(kind, &title).is_some() {
            return AddWatch::AlreadyWatching;
        }
        self.watches_mut(kind).push(WatchEntry {
            title,
            progress: initial_progress,
        });
        AddWatch::Added
    }

    /// Remove a watch entry by case-insensitive title. Returns false if
    /// the title was not being watched.
    pub fn remove_watch(&mut self, kind: WatchKind, title: &str) -> bool {
        let needle = normalize_title(title);
        let set = self.watches_mut(kind);
        let before = set.len();
        set.retain(|w| normalize_title(&w.title) != needle);
        set.len() < before
    }

    /// Ratchet a watch entry's progress up to `latest`. Progress never
    /// decreases, even if upstream later reports a lower number.
    /// Returns true if the stored value changed.
    pub fn advance_watch(&mut self, kind: WatchKind, title: &str, latest: f64) -> bool {
        let needle = normalize_title(title);
        for w in self.watches_mut(kind) {
            if normalize_title(&w.title) == needle {
                if latest > w.progress {
                    w.progress = latest;
                    return true;
                }
                return false;
            }
        }
        false
    }

    pub fn set_channel(&mut self, kind: ChannelKind, channel_id: impl Into<String>) {
        let channel_id = channel_id.into();
        match kind {
            ChannelKind::Notification => self.notification_channel = Some(channel_id),
            ChannelKind::Command => self.command_channel = Some(channel_id),
        }
    }

    /// Where notifications for this subscriber should go:
    /// the notification channel if set, else the command channel.
    pub fn notify_channel(&self) -> Option<&str> {
        self.notification_channel
            .as_deref()
            .or(self.command_channel.as_deref())
    }
}

/// Canonical grouping key for a title: lowercased and trimmed.
/// Internal whitespace is deliberately preserved.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Normalized upstream state for one title, produced by an adapter and
/// consumed within the same tick. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTitleState {
    pub display_title: String,
    /// Latest released episode/chapter number.
    pub latest: f64,
    /// Canonical page for the release.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_watch_rejected_case_insensitive() {
        let mut rec = SubscriberRecord::new("u1", "g1");
        assert_eq!(rec.add_watch(WatchKind::Anime, "One Piece", 5.0), AddWatch::Added);
        assert_eq!(
            rec.add_watch(WatchKind::Anime, "one piece", 0.0),
            AddWatch::AlreadyWatching
        );
        assert_eq!(rec.anime_watches.len(), 1);
        assert_eq!(rec.anime_watches[0].progress, 5.0);
    }

    #[test]
    fn same_title_allowed_across_kinds() {
        let mut rec = SubscriberRecord::new("u1", "g1");
        assert_eq!(rec.add_watch(WatchKind::Anime, "Berserk", 0.0), AddWatch::Added);
        assert_eq!(rec.add_watch(WatchKind::Manga, "Berserk", 0.0), AddWatch::Added);
    }

    #[test]
    fn advance_is_a_monotonic_ratchet() {
        let mut rec = SubscriberRecord::new("u1", "g1");
        rec.add_watch(WatchKind::Manga, "Berserk", 3.0);

        assert!(rec.advance_watch(WatchKind::Manga, "berserk", 5.5));
        assert_eq!(rec.manga_watches[0].progress, 5.5);

        // Equal and lower values never move the stored progress.
        assert!(!rec.advance_watch(WatchKind::Manga, "Berserk", 5.5));
        assert!(!rec.advance_watch(WatchKind::Manga, "Berserk", 4.0));
        assert_eq!(rec.manga_watches[0].progress, 5.5);
    }

    #[test]
    fn remove_watch_by_any_case() {
        let mut rec = SubscriberRecord::new("u1", "g1");
        rec.add_watch(WatchKind::Anime, "Frieren", 10.0);
        assert!(rec.remove_watch(WatchKind::Anime, "FRIEREN"));
        assert!(!rec.remove_watch(WatchKind::Anime, "Frieren"));
        assert!(rec.anime_watches.is_empty());
    }

    #[test]
    fn notify_channel_falls_back_to_command_channel() {
        let mut rec = SubscriberRecord::new("u1", "g1");
        assert_eq!(rec.notify_channel(), None);

        rec.set_channel(ChannelKind::Command, "c-cmd");
        assert_eq!(rec.notify_channel(), Some("c-cmd"));

        rec.set_channel(ChannelKind::Notification, "c-notify");
        assert_eq!(rec.notify_channel(), Some("c-notify"));
    }

    #[test]
    fn normalize_keeps_internal_whitespace() {
        assert_eq!(normalize_title("  One Piece "), "one piece");
        // Double space stays distinct from single space.
        assert_ne!(normalize_title("One  Piece"), normalize_title("One Piece"));
    }
}
