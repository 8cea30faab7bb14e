//! Replaying persisted torrent records at startup.

use super::SessionManager;
use crate::db::TorrentRecord;
use crate::error::Result;
use crate::types::TorrentSpec;

/// Outcome of one recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records now backed by a session
    pub restored: usize,
    /// Records that could not be decoded or added
    pub skipped: usize,
}

impl SessionManager {
    /// Rebuild sessions from every stored torrent record
    ///
    /// Each record becomes a `TorrentSpec` (trackers, name, hash and the info
    /// dictionary when it was captured) that goes through [`add_spec`], after
    /// which its start sequence is resumed. Records without an info
    /// dictionary re-enter the metadata phase. Corrupt records and engine
    /// rejections are logged and skipped.
    ///
    /// Running this again against a populated registry creates no duplicate
    /// sessions and no duplicate tasks.
    ///
    /// [`add_spec`]: SessionManager::add_spec
    pub async fn recover(&self) -> Result<RecoveryReport> {
        self.reload_queue().await?;

        let rows = self.db.list_torrent_rows().await?;
        let mut report = RecoveryReport::default();

        for row in rows {
            let raw_hash = row.hash.clone();
            let record = match TorrentRecord::try_from(row) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(hash = %raw_hash, error = %e, "skipping unreadable torrent record");
                    report.skipped += 1;
                    continue;
                }
            };

            let spec = TorrentSpec {
                info_hash: record.hash,
                display_name: Some(record.name.clone()),
                trackers: record.trackers.clone(),
                info_bytes: record.info_bytes.clone(),
            };

            let session = match self.add_spec(spec).await {
                Ok((session, _)) => session,
                Err(e) => {
                    tracing::warn!(hash = %record.hash, error = %e, "failed to restore torrent");
                    report.skipped += 1;
                    continue;
                }
            };

            let flags = session.flags().await;
            if flags.paused {
                session.torrent.set_max_established_conns(0);
            }
            self.ensure_task(&session).await;

            tracing::debug!(
                hash = %record.hash,
                paused = flags.paused,
                has_info = session.torrent.has_info(),
                "torrent restored"
            );
            report.restored += 1;
        }

        if report.restored > 0 || report.skipped > 0 {
            tracing::info!(
                restored = report.restored,
                skipped = report.skipped,
                "Recovered torrents from database"
            );
        }

        Ok(report)
    }
}
