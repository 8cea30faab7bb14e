//! Fixed-id JSON records: issued tokens, config snapshot, active queue.

use crate::error::DatabaseError;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ConfigSnapshot, Database, QueueRecord, TokenRecord};

/// Well-known singleton ids
pub mod singleton_id {
    /// Issued tokens and signing key
    pub const TOKENS: i64 = 3;
    /// Last applied client-connect settings
    pub const CONFIG: i64 = 4;
    /// Active / queued / forced partition
    pub const QUEUES: i64 = 5;
}

impl Database {
    /// Load and decode a singleton record
    pub async fn get_singleton<T: DeserializeOwned>(&self, id: i64) -> Result<Option<T>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM singletons WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get singleton {}: {}",
                    id, e
                )))
            })?;

        body.map(|body| {
            serde_json::from_str(&body).map_err(|e| {
                Error::Database(DatabaseError::CorruptRecord(format!(
                    "singleton {}: {}",
                    id, e
                )))
            })
        })
        .transpose()
    }

    /// Insert or replace a singleton record
    pub async fn put_singleton<T: Serialize>(&self, id: i64, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO singletons (id, body, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to store singleton {}: {}",
                id, e
            )))
        })?;

        Ok(())
    }

    /// Token record, if tokens were ever initialised
    pub async fn load_tokens(&self) -> Result<Option<TokenRecord>> {
        self.get_singleton(singleton_id::TOKENS).await
    }

    /// Replace the token record
    pub async fn save_tokens(&self, record: &TokenRecord) -> Result<()> {
        self.put_singleton(singleton_id::TOKENS, record).await
    }

    /// Queue record, empty when never saved
    pub async fn load_queues(&self) -> Result<QueueRecord> {
        Ok(self
            .get_singleton(singleton_id::QUEUES)
            .await?
            .unwrap_or_default())
    }

    /// Replace the queue record
    pub async fn save_queues(&self, record: &QueueRecord) -> Result<()> {
        self.put_singleton(singleton_id::QUEUES, record).await
    }

    /// Last applied client-connect settings
    pub async fn load_config_snapshot(&self) -> Result<Option<ConfigSnapshot>> {
        self.get_singleton(singleton_id::CONFIG).await
    }

    /// Replace the client-connect snapshot
    pub async fn save_config_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.put_singleton(singleton_id::CONFIG, snapshot).await
    }
}
