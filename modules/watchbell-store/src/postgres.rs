use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use watchbell_common::SubscriberRecord;

use crate::SubscriptionStore;

/// Postgres-backed store. The full record is kept as one jsonb column so
/// the persisted shape tracks `SubscriberRecord` without migrations for
/// every field change; `(user_id, guild_id)` is the primary key.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    /// Create the subscriptions table if it does not exist. Safe to run
    /// on every startup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                user_id    TEXT NOT NULL,
                guild_id   TEXT NOT NULL,
                record     JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (user_id, guild_id)
            )",
        )
        .execute(&self.pool)
        .await?;
        info!("Subscription table ready");
        Ok(())
    }
}

fn decode(value: serde_json::Value) -> Result<SubscriberRecord> {
    serde_json::from_value(value).context("Malformed subscription record in store")
}

#[async_trait]
impl SubscriptionStore for PostgresStore {
    async fn find(&self, user_id: &str, guild_id: &str) -> Result<Option<SubscriberRecord>> {
        let row = sqlx::query("SELECT record FROM subscriptions WHERE user_id = $1 AND guild_id = $2")
            .bind(user_id)
            .bind(guild_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(decode(row.get("record"))?)),
            None => Ok(None),
        }
    }

    async fn find_or_create(&self, user_id: &str, guild_id: &str) -> Result<SubscriberRecord> {
        if let Some(existing) = self.find(user_id, guild_id).await? {
            return Ok(existing);
        }

        let mut record = SubscriberRecord::new(user_id, guild_id);

        // Guild channel convention propagates to new members.
        let sibling = sqlx::query("SELECT record FROM subscriptions WHERE guild_id = $1 LIMIT 1")
            .bind(guild_id)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = sibling {
            let sibling = decode(row.get("record"))?;
            record.notification_channel = sibling.notification_channel;
            record.command_channel = sibling.command_channel;
        }

        self.save(&record).await?;
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>> {
        let rows = sqlx::query("SELECT record FROM subscriptions ORDER BY guild_id, user_id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|row| decode(row.get("record"))).collect()
    }

    async fn save(&self, record: &SubscriberRecord) -> Result<()> {
        let value = serde_json::to_value(record).context("Failed to serialize record")?;
        sqlx::query(
            "INSERT INTO subscriptions (user_id, guild_id, record, updated_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (user_id, guild_id)
             DO UPDATE SET record = EXCLUDED.record, updated_at = now()",
        )
        .bind(&record.user_id)
        .bind(&record.guild_id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
