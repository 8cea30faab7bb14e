//! Per-torrent background task: metadata phase, then completion.

use super::{Session, SessionManager};
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

impl SessionManager {
    /// Spawn the start sequence for a session unless one is already running
    ///
    /// The task waits for metadata, marks the session as no longer fetching,
    /// stores the info dictionary, requests the full download (unless the
    /// session is paused) and then waits for completion. Deleting the session
    /// cancels the task; a task that finds its session gone exits quietly.
    pub(crate) async fn ensure_task(&self, session: &Arc<Session>) {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&session.hash) {
            return;
        }

        let generation = self.task_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        tasks.insert(session.hash, (generation, token.clone()));
        drop(tasks);

        let manager = self.clone();
        let session = session.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(hash = %session.hash, "start task cancelled");
                }
                _ = manager.run_start_sequence(&session) => {}
            }

            let mut tasks = manager.tasks.lock().await;
            if tasks
                .get(&session.hash)
                .is_some_and(|(current, _)| *current == generation)
            {
                tasks.remove(&session.hash);
            }
        });
    }

    /// Cancel the task for a hash, if any
    pub(crate) async fn cancel_task(&self, hash: &crate::types::InfoHash) {
        if let Some((_, token)) = self.tasks.lock().await.remove(hash) {
            token.cancel();
        }
    }

    async fn run_start_sequence(&self, session: &Arc<Session>) {
        let hash = session.hash;
        session.torrent.wait_for_info().await;

        if !self.registry.contains(session).await {
            tracing::debug!(hash = %hash, "session removed before metadata arrived");
            return;
        }

        let name = session.torrent.name();
        let was_fetching = session.flags().await.fetching_metadata;
        if was_fetching
            && let Some(info_bytes) = session.torrent.info_bytes()
            && let Err(e) = self
                .db
                .store_torrent_metadata(&hash, &name, &info_bytes)
                .await
        {
            tracing::error!(hash = %hash, error = %e, "failed to persist metadata");
            session.mark_errored().await;
        }

        let flags = match session
            .update_flags(&self.db, |f| f.fetching_metadata = false)
            .await
        {
            Ok(flags) => flags,
            Err(e) => {
                tracing::error!(hash = %hash, error = %e, "failed to persist metadata flag");
                session.mark_errored().await;
                session.flags().await
            }
        };

        // A start or stop may land while the engine is being configured;
        // reapply until the applied pause state matches the stored one.
        let mut paused = flags.paused;
        loop {
            if paused {
                session.torrent.set_max_established_conns(0);
            } else {
                session.torrent.download_all();
                session
                    .torrent
                    .set_max_established_conns(flags.max_connections);
            }
            let current = session.flags().await.paused;
            if current == paused {
                break;
            }
            paused = current;
        }

        if was_fetching {
            tracing::info!(hash = %hash, name = %name, "metadata received");
            self.emit_event(Event::MetadataReceived {
                hash: hash.to_hex(),
                name: name.clone(),
            });
        }

        let before = session.torrent.stats();
        if !was_fetching && before.length.is_some() && before.bytes_missing == 0 {
            // Restored in a completed state; nothing new to report
            return;
        }

        session.torrent.wait_for_completion().await;

        if !self.registry.contains(session).await {
            return;
        }

        let stats = session.torrent.stats();
        if let Err(e) = self
            .db
            .update_torrent_counters(&hash, stats.bytes_uploaded, stats.bytes_completed)
            .await
        {
            tracing::warn!(hash = %hash, error = %e, "failed to persist counters on completion");
        }

        tracing::info!(hash = %hash, name = %name, "download completed");
        self.emit_event(Event::Completed {
            hash: hash.to_hex(),
            name,
        });
    }
}
