pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use async_trait::async_trait;

use watchbell_common::SubscriberRecord;

/// Persisted subscriber records, keyed by `(user_id, guild_id)`.
///
/// Watch-set mutation itself lives on [`SubscriberRecord`]; the store's
/// job is lookup, snapshotting, and idempotent persistence. Command
/// handlers re-read through `find_or_create` before mutating so a tick's
/// concurrent save cannot corrupt the watch sets.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Look up one record.
    async fn find(&self, user_id: &str, guild_id: &str) -> Result<Option<SubscriberRecord>>;

    /// Look up one record, creating it with empty watch sets if absent.
    /// A newly created record inherits the notification/command channels
    /// of any existing record in the same guild.
    async fn find_or_create(&self, user_id: &str, guild_id: &str) -> Result<SubscriberRecord>;

    /// Full snapshot for a reconciliation tick.
    async fn list_all(&self) -> Result<Vec<SubscriberRecord>>;

    /// Idempotent upsert of the full record.
    async fn save(&self, record: &SubscriberRecord) -> Result<()>;
}
