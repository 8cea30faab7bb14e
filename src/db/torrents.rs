//! Torrent record CRUD operations.

use crate::error::DatabaseError;
use crate::types::InfoHash;
use crate::{Error, Result};

use super::{Database, TorrentFlags, TorrentRecord, TorrentRow};

const SELECT_COLUMNS: &str = r#"
    SELECT
        hash, info_bytes, date_added, storage_path, temp_storage_path, name,
        trackers, label, file_priorities, uploaded_bytes, downloaded_bytes,
        max_connections, upload_unlimited, is_active, is_paused, is_fetching_metadata
    FROM torrents
"#;

impl Database {
    /// Insert a torrent record unless one already exists for the hash
    ///
    /// Returns true when a new row was written.
    pub async fn insert_torrent_if_absent(&self, record: &TorrentRecord) -> Result<bool> {
        let trackers = serde_json::to_string(&record.trackers)?;
        let file_priorities = serde_json::to_string(&record.file_priorities)?;

        let result = sqlx::query(
            r#"
            INSERT INTO torrents (
                hash, info_bytes, date_added, storage_path, temp_storage_path, name,
                trackers, label, file_priorities, uploaded_bytes, downloaded_bytes,
                max_connections, upload_unlimited, is_active, is_paused, is_fetching_metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
        )
        .bind(record.hash.to_hex())
        .bind(&record.info_bytes)
        .bind(&record.date_added)
        .bind(&record.storage_path)
        .bind(&record.temp_storage_path)
        .bind(&record.name)
        .bind(trackers)
        .bind(&record.label)
        .bind(file_priorities)
        .bind(record.uploaded_bytes as i64)
        .bind(record.downloaded_bytes as i64)
        .bind(i64::from(record.max_connections))
        .bind(record.upload_unlimited as i32)
        .bind(record.is_active as i32)
        .bind(record.is_paused as i32)
        .bind(record.is_fetching_metadata as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert torrent: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a torrent record by hash
    pub async fn get_torrent(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>> {
        let query = format!("{SELECT_COLUMNS} WHERE hash = ?");
        let row = sqlx::query_as::<_, TorrentRow>(&query)
            .bind(hash.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get torrent: {}",
                    e
                )))
            })?;

        row.map(TorrentRecord::try_from).transpose()
    }

    /// List every stored torrent row, undecoded
    ///
    /// Callers decode each row with [`TorrentRecord::try_from`] so one
    /// corrupt row does not hide the rest.
    pub async fn list_torrent_rows(&self) -> Result<Vec<TorrentRow>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY date_added ASC");
        let rows = sqlx::query_as::<_, TorrentRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list torrents: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// Overwrite the flag columns of a torrent
    pub async fn update_torrent_flags(&self, hash: &InfoHash, flags: &TorrentFlags) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE torrents
            SET is_active = ?, is_paused = ?, is_fetching_metadata = ?,
                label = ?, max_connections = ?, upload_unlimited = ?
            WHERE hash = ?
            "#,
        )
        .bind(flags.is_active as i32)
        .bind(flags.is_paused as i32)
        .bind(flags.is_fetching_metadata as i32)
        .bind(&flags.label)
        .bind(i64::from(flags.max_connections))
        .bind(flags.upload_unlimited as i32)
        .bind(hash.to_hex())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update torrent flags: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "torrent {}",
                hash
            ))));
        }

        Ok(())
    }

    /// Store the info dictionary and the name it carries
    pub async fn store_torrent_metadata(
        &self,
        hash: &InfoHash,
        name: &str,
        info_bytes: &[u8],
    ) -> Result<()> {
        sqlx::query("UPDATE torrents SET info_bytes = ?, name = ? WHERE hash = ?")
            .bind(info_bytes)
            .bind(name)
            .bind(hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to store torrent metadata: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record transfer counters
    pub async fn update_torrent_counters(
        &self,
        hash: &InfoHash,
        uploaded_bytes: u64,
        downloaded_bytes: u64,
    ) -> Result<()> {
        sqlx::query("UPDATE torrents SET uploaded_bytes = ?, downloaded_bytes = ? WHERE hash = ?")
            .bind(uploaded_bytes as i64)
            .bind(downloaded_bytes as i64)
            .bind(hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update torrent counters: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete a torrent record, returning whether a row existed
    pub async fn delete_torrent(&self, hash: &InfoHash) -> Result<bool> {
        let result = sqlx::query("DELETE FROM torrents WHERE hash = ?")
            .bind(hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete torrent: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
