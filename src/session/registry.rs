//! Concurrency-safe index of sessions by content hash.

use super::{Session, status};
use crate::types::{InfoHash, StateFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sessions keyed by content hash
///
/// Insertion and removal take the exclusive lock; lookups, listing and
/// filtering share it. A session is fully constructed before it is inserted,
/// so readers never observe a partial one.
#[derive(Default)]
pub struct Registry {
    sessions: RwLock<HashMap<InfoHash, Arc<Session>>>,
}

impl Registry {
    /// Return the session for `hash`, inserting the one built by `make` when absent
    ///
    /// The check and the insert happen under one exclusive lock. The boolean
    /// is true only when `make` was called and its session inserted.
    pub async fn insert_or_get<F>(&self, hash: InfoHash, make: F) -> (Arc<Session>, bool)
    where
        F: FnOnce() -> Session,
    {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&hash) {
            return (existing.clone(), false);
        }

        let session = Arc::new(make());
        sessions.insert(hash, session.clone());
        (session, true)
    }

    /// Session for a hash
    pub async fn lookup(&self, hash: &InfoHash) -> Option<Arc<Session>> {
        self.sessions.read().await.get(hash).cloned()
    }

    /// Whether this exact session is still registered
    pub async fn contains(&self, session: &Arc<Session>) -> bool {
        self.sessions
            .read()
            .await
            .get(&session.hash)
            .is_some_and(|s| Arc::ptr_eq(s, session))
    }

    /// Snapshot copy of every session
    pub async fn list(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Sessions matching a filter class
    pub async fn filter(&self, filter: StateFilter) -> Vec<Arc<Session>> {
        let sessions = self.list().await;
        let mut matching = Vec::new();
        for session in sessions {
            let flags = session.flags().await;
            if status::matches_filter(filter, &flags, &session.torrent.stats()) {
                matching.push(session);
            }
        }
        matching
    }

    /// Remove the in-memory entry only
    pub async fn remove(&self, hash: &InfoHash) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(hash)
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
