//! Active set management - capacity, demotion, forced torrents.
//!
//! The active list is ordered most recently started first. When it grows
//! past `max_active_torrents`, entries are taken from the back (least
//! recently started), moved to the queued list and paused. Forced torrents
//! live in their own list and never count against the limit.

use super::SessionManager;
use crate::db::QueueRecord;
use crate::error::Result;
use crate::types::{Event, InfoHash};

fn remove_everywhere(queue: &mut QueueRecord, hash: &InfoHash) {
    queue.active.retain(|h| h != hash);
    queue.queued.retain(|h| h != hash);
    queue.forced.retain(|h| h != hash);
}

impl SessionManager {
    /// Apply `change` to a copy of the queue, persist it, then commit
    async fn update_queue<F, R>(&self, change: F) -> Result<R>
    where
        F: FnOnce(&mut QueueRecord) -> R,
    {
        let mut queue = self.queue.lock().await;
        let mut next = queue.clone();
        let out = change(&mut next);
        self.db.save_queues(&next).await?;
        *queue = next;
        Ok(out)
    }

    /// Put `hash` at the front of the active list, demoting overflow
    ///
    /// Returns the demoted hashes, which have been paused.
    pub(crate) async fn activate(&self, hash: InfoHash) -> Result<Vec<InfoHash>> {
        let limit = self.config.download.max_active_torrents;
        let demoted = self
            .update_queue(|queue| {
                remove_everywhere(queue, &hash);
                queue.active.insert(0, hash);

                let mut demoted = Vec::new();
                while queue.active.len() > limit {
                    if let Some(evicted) = queue.active.pop() {
                        queue.queued.push(evicted);
                        demoted.push(evicted);
                    }
                }
                demoted
            })
            .await?;

        for evicted in &demoted {
            tracing::info!(hash = %evicted, limit, "active limit reached, demoting torrent");
            if let Err(e) = self.pause_session(evicted).await {
                tracing::warn!(hash = %evicted, error = %e, "failed to pause demoted torrent");
                continue;
            }
            self.emit_event(Event::Demoted {
                hash: evicted.to_hex(),
            });
        }

        Ok(demoted)
    }

    /// Move `hash` to the queued list
    pub(crate) async fn deactivate(&self, hash: InfoHash) -> Result<()> {
        self.update_queue(|queue| {
            remove_everywhere(queue, &hash);
            queue.queued.push(hash);
        })
        .await
    }

    /// Move `hash` to the forced list
    pub(crate) async fn force(&self, hash: InfoHash) -> Result<()> {
        self.update_queue(|queue| {
            remove_everywhere(queue, &hash);
            queue.forced.push(hash);
        })
        .await
    }

    /// Drop `hash` from every list
    pub(crate) async fn forget(&self, hash: InfoHash) -> Result<()> {
        self.update_queue(|queue| remove_everywhere(queue, &hash))
            .await
    }

    /// Replace the in-memory queue with the stored one
    pub(crate) async fn reload_queue(&self) -> Result<()> {
        let stored = self.db.load_queues().await?;
        *self.queue.lock().await = stored;
        Ok(())
    }
}
