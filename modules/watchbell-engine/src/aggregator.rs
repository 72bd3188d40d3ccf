use std::collections::HashMap;

use watchbell_common::{normalize_title, SubscriberRecord, WatchKind};

/// One subscriber's stake in a title group.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub user_id: String,
    pub guild_id: String,
    /// Last-known progress for this watch entry.
    pub progress: f64,
    /// Resolved at grouping time: notification channel if set, else
    /// command channel. Entries without a channel stay in the group —
    /// their notification is skipped at dispatch time, but their
    /// progress still advances.
    pub channel_id: Option<String>,
}

/// Ephemeral index: every watch entry sharing a normalized title, so one
/// tick costs one upstream fetch per unique title. Rebuilt every tick,
/// never persisted.
#[derive(Debug, Clone)]
pub struct TitleGroup {
    /// Title as first seen, used verbatim for the upstream query.
    pub query_title: String,
    pub entries: Vec<GroupEntry>,
}

/// Group a snapshot of subscriber records by normalized title for one
/// watch kind. Returns groups sorted by key for deterministic iteration.
pub fn group(records: &[SubscriberRecord], kind: WatchKind) -> Vec<(String, TitleGroup)> {
    let mut groups: HashMap<String, TitleGroup> = HashMap::new();

    for record in records {
        let channel_id = record.notify_channel().map(String::from);
        for watch in record.watches(kind) {
            let key = normalize_title(&watch.title);
            let entry = GroupEntry {
                user_id: record.user_id.clone(),
                guild_id: record.guild_id.clone(),
                progress: watch.progress,
                channel_id: channel_id.clone(),
            };
            groups
                .entry(key)
                .or_insert_with(|| TitleGroup {
                    query_title: watch.title.clone(),
                    entries: Vec::new(),
                })
                .entries
                .push(entry);
        }
    }

    let mut out: Vec<_> = groups.into_iter().collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}
