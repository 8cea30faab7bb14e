//! Torrent lifecycle control - add, start, stop, delete, force upload.

use super::{Session, SessionManager};
use crate::db::TorrentRecord;
use crate::error::{Error, Result, SessionError};
use crate::types::{Event, InfoHash, TorrentSpec};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl SessionManager {
    /// Add a torrent, returning the existing session when the hash is known
    ///
    /// A new session starts active, unpaused and fetching metadata. When a
    /// record already exists for the hash (a restart), its date, label,
    /// pause state and limits are restored instead. The record is created
    /// when absent.
    ///
    /// The boolean is true only for the call that created the session.
    pub async fn add_spec(&self, spec: TorrentSpec) -> Result<(Arc<Session>, bool)> {
        if let Some(existing) = self.registry.lookup(&spec.info_hash).await {
            return Ok((existing, false));
        }

        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let hash = spec.info_hash;
        let torrent = self.engine.add_torrent(&spec).await?;
        let stored = self.db.get_torrent(&hash).await?;

        let (date_added, flags) = match &stored {
            Some(record) => {
                let mut flags = self.default_flags();
                flags.active = record.is_active;
                flags.paused = record.is_paused;
                flags.fetching_metadata = !torrent.has_info();
                flags.label = record.label.clone();
                flags.max_connections = record.max_connections;
                flags.upload_unlimited = record.upload_unlimited;
                (record.date_added.clone(), flags)
            }
            None => (chrono::Utc::now().to_rfc3339(), self.default_flags()),
        };

        if stored.is_none() {
            let download_dir = self.config.download_dir().display().to_string();
            let record = TorrentRecord {
                hash,
                info_bytes: spec.info_bytes.clone(),
                date_added: date_added.clone(),
                storage_path: download_dir.clone(),
                temp_storage_path: download_dir,
                name: torrent.name(),
                trackers: spec.trackers.clone(),
                label: flags.label.clone(),
                file_priorities: Vec::new(),
                uploaded_bytes: 0,
                downloaded_bytes: 0,
                max_connections: flags.max_connections,
                upload_unlimited: flags.upload_unlimited,
                is_active: flags.active,
                is_paused: flags.paused,
                is_fetching_metadata: flags.fetching_metadata,
            };
            self.db.insert_torrent_if_absent(&record).await?;
        }

        if flags.upload_unlimited {
            torrent.set_upload_unlimited(true);
        }

        let (session, is_new) = self
            .registry
            .insert_or_get(hash, || {
                Session::new(hash, torrent.clone(), date_added, flags)
            })
            .await;

        if is_new {
            tracing::info!(hash = %hash, name = %session.torrent.name(), "torrent added");
            self.emit_event(Event::Added {
                hash: hash.to_hex(),
                name: session.torrent.name(),
            });
        }

        Ok((session, is_new))
    }

    /// Parse a magnet link, add it and start it
    ///
    /// An already known torrent is returned untouched. If labelling or
    /// queueing a new torrent fails, it is removed again and the error
    /// returned.
    pub async fn add_magnet(&self, uri: &str, label: Option<String>) -> Result<Arc<Session>> {
        let spec = TorrentSpec::from_magnet(uri)?;
        let (session, is_new) = self.add_spec(spec).await?;

        if !is_new {
            tracing::debug!(hash = %session.hash, "magnet link already present");
            return Ok(session);
        }

        if let Err(e) = self.start_new(&session, label).await {
            tracing::warn!(hash = %session.hash, error = %e, "failed to start new torrent, discarding it");
            self.discard(&session).await;
            return Err(e);
        }

        Ok(session)
    }

    async fn start_new(&self, session: &Arc<Session>, label: Option<String>) -> Result<()> {
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            session
                .update_flags(&self.db, |f| f.label = Some(label))
                .await?;
        }

        self.ensure_task(session).await;
        self.activate(session.hash).await?;
        Ok(())
    }

    /// Undo a half-started add so a resubmit starts from scratch
    ///
    /// Store failures here are logged; the caller already reports the
    /// original error.
    async fn discard(&self, session: &Arc<Session>) {
        let hash = session.hash;
        self.cancel_task(&hash).await;
        self.registry.remove(&hash).await;
        session.torrent.drop_torrent();

        if let Err(e) = self.forget(hash).await {
            tracing::warn!(hash = %hash, error = %e, "failed to drop discarded torrent from queue");
        }
        if let Err(e) = self.db.delete_torrent(&hash).await {
            tracing::warn!(hash = %hash, error = %e, "failed to delete discarded torrent record");
        }

        self.emit_event(Event::Removed { hash: hash.to_hex() });
    }

    /// Resume a torrent and move it to the front of the active set
    pub async fn start(&self, hash: &InfoHash) -> Result<()> {
        let session = self.require(hash).await?;

        let flags = session
            .update_flags(&self.db, |f| {
                f.active = true;
                f.paused = false;
            })
            .await?;

        if session.torrent.has_info() {
            session.torrent.download_all();
            session
                .torrent
                .set_max_established_conns(flags.max_connections);
        }
        self.ensure_task(&session).await;
        self.activate(*hash).await?;

        tracing::info!(hash = %hash, "torrent started");
        self.emit_event(Event::Started { hash: hash.to_hex() });
        Ok(())
    }

    /// Pause a torrent and move it to the queued set
    pub async fn stop(&self, hash: &InfoHash) -> Result<()> {
        self.pause_session(hash).await?;
        self.deactivate(*hash).await?;

        tracing::info!(hash = %hash, "torrent stopped");
        self.emit_event(Event::Stopped { hash: hash.to_hex() });
        Ok(())
    }

    pub(crate) async fn pause_session(&self, hash: &InfoHash) -> Result<()> {
        let session = self.require(hash).await?;
        session
            .update_flags(&self.db, |f| {
                f.active = false;
                f.paused = true;
            })
            .await?;
        session.torrent.set_max_established_conns(0);
        Ok(())
    }

    /// Remove a torrent, optionally deleting its data
    ///
    /// The data path is checked before anything is removed. The record is
    /// deleted next; the registry entry, engine handle and background task
    /// go only once that succeeded.
    pub async fn delete(&self, hash: &InfoHash, with_data: bool) -> Result<()> {
        let session = self.require(hash).await?;
        let data_path = if with_data {
            Some(self.data_path(&session.torrent.name())?)
        } else {
            None
        };

        self.db.delete_torrent(hash).await?;
        self.cancel_task(hash).await;
        self.registry.remove(hash).await;
        session.torrent.drop_torrent();
        self.forget(*hash).await?;

        if let Some(target) = data_path {
            remove_data(&target).await?;
        }

        tracing::info!(hash = %hash, with_data, "torrent deleted");
        self.emit_event(Event::Removed { hash: hash.to_hex() });
        Ok(())
    }

    /// Lift the upload limit and keep the torrent running outside the active cap
    pub async fn force_upload(&self, hash: &InfoHash) -> Result<()> {
        let session = self.require(hash).await?;
        let max_connections = self.config.download.default_max_connections;

        session
            .update_flags(&self.db, |f| {
                f.upload_unlimited = true;
                f.active = true;
                f.paused = false;
                f.max_connections = max_connections;
            })
            .await?;

        session.torrent.set_upload_unlimited(true);
        if session.torrent.has_info() {
            session.torrent.download_all();
            session.torrent.set_max_established_conns(max_connections);
        }
        self.ensure_task(&session).await;
        self.force(*hash).await?;

        tracing::info!(hash = %hash, "torrent force started");
        self.emit_event(Event::Started { hash: hash.to_hex() });
        Ok(())
    }

    async fn require(&self, hash: &InfoHash) -> Result<Arc<Session>> {
        self.registry.lookup(hash).await.ok_or_else(|| {
            Error::Session(SessionError::NotFound {
                hash: hash.to_hex(),
            })
        })
    }

    /// Location of a torrent's data, refusing names that leave the download directory
    fn data_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.is_absolute()
            || name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(Error::Session(SessionError::UnsafePath {
                path: relative.to_path_buf(),
                reason: "name escapes the download directory".into(),
            }));
        }

        Ok(self.config.download_dir().join(relative))
    }
}

async fn remove_data(target: &Path) -> Result<()> {
    let result = match tokio::fs::metadata(target).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(target).await,
        Ok(_) => tokio::fs::remove_file(target).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %target.display(), "no data to remove");
            return Ok(());
        }
        Err(e) => Err(e),
    };

    result.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to remove '{}': {}", target.display(), e),
        ))
    })
}
