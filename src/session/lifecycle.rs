//! Shutdown coordination.

use super::SessionManager;
use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;

impl SessionManager {
    /// Gracefully shut down the manager
    ///
    /// 1. Stops accepting new torrents
    /// 2. Cancels every background task and waits for them to exit (10 second cap)
    /// 3. Persists transfer counters and the queue
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Persistence failures are logged; the sequence always runs to the end.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);

        {
            let tasks = self.tasks.lock().await;
            tracing::debug!(task_count = tasks.len(), "Cancelling background tasks");
            for (hash, (_, token)) in tasks.iter() {
                tracing::debug!(hash = %hash, "Signaling task cancellation");
                token.cancel();
            }
        }

        let wait = tokio::time::timeout(std::time::Duration::from_secs(10), self.wait_for_tasks());
        if wait.await.is_err() {
            tracing::warn!("Timeout waiting for background tasks, proceeding with shutdown");
        }

        if let Err(e) = self.persist_all_state().await {
            tracing::error!(error = %e, "Failed to persist final state during shutdown");
        } else {
            tracing::info!("Final state persisted to database");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_tasks(&self) {
        loop {
            let remaining = self.tasks.lock().await.len();
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Write counters for every session and the current queue
    pub(crate) async fn persist_all_state(&self) -> Result<()> {
        let sessions = self.registry.list().await;
        for session in &sessions {
            let stats = session.torrent.stats();
            self.db
                .update_torrent_counters(&session.hash, stats.bytes_uploaded, stats.bytes_completed)
                .await?;
        }

        let queue = self.queue.lock().await.clone();
        self.db.save_queues(&queue).await?;

        tracing::debug!(sessions = sessions.len(), "Persisted session counters");
        Ok(())
    }
}
