use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use watchbell_common::SubscriberRecord;

use crate::SubscriptionStore;

/// In-memory store. Backs tests and token-only deployments where no
/// DATABASE_URL is configured (state is lost on restart).
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), SubscriberRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find(&self, user_id: &str, guild_id: &str) -> Result<Option<SubscriberRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&(user_id.to_string(), guild_id.to_string()))
            .cloned())
    }

    async fn find_or_create(&self, user_id: &str, guild_id: &str) -> Result<SubscriberRecord> {
        let mut records = self.records.write().await;
        let key = (user_id.to_string(), guild_id.to_string());
        if let Some(existing) = records.get(&key) {
            return Ok(existing.clone());
        }

        let mut record = SubscriberRecord::new(user_id, guild_id);
        // Guild channel convention propagates to new members.
        if let Some(sibling) = records.values().find(|r| r.guild_id == guild_id) {
            record.notification_channel = sibling.notification_channel.clone();
            record.command_channel = sibling.command_channel.clone();
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| (&a.guild_id, &a.user_id).cmp(&(&b.guild_id, &b.user_id)));
        Ok(all)
    }

    async fn save(&self, record: &SubscriberRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(
            (record.user_id.clone(), record.guild_id.clone()),
            record.clone(),
        );
        Ok(())
    }
}
