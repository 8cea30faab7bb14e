//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::Database;

/// Schema versions, applied in order. Each one runs in its own transaction.
const MIGRATIONS: &[(i64, &str, &[&str])] = &[(
    1,
    "torrents and singletons tables",
    &[
        r#"
        CREATE TABLE torrents (
            hash TEXT PRIMARY KEY NOT NULL,
            info_bytes BLOB,
            date_added TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            temp_storage_path TEXT NOT NULL,
            name TEXT NOT NULL,
            trackers TEXT NOT NULL DEFAULT '[]',
            label TEXT,
            file_priorities TEXT NOT NULL DEFAULT '[]',
            uploaded_bytes INTEGER NOT NULL DEFAULT 0,
            downloaded_bytes INTEGER NOT NULL DEFAULT 0,
            max_connections INTEGER NOT NULL DEFAULT 0,
            upload_unlimited INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_paused INTEGER NOT NULL DEFAULT 0,
            is_fetching_metadata INTEGER NOT NULL DEFAULT 1
        )
        "#,
        r#"
        CREATE TABLE singletons (
            id INTEGER PRIMARY KEY NOT NULL,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    ],
)];

fn connection_failed(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_failed(context: String) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::MigrationFailed(format!("{context}: {e}")))
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date
    ///
    /// The pool runs in WAL mode so readers never block the writer.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(connection_failed("Failed to parse database path"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(connection_failed("Failed to connect to database"))?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(connection_failed("Failed to acquire connection"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_failed("Failed to create schema_version table".into()))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {e}"
                )))
            })?;
        let current = current.unwrap_or(0);

        for (version, description, statements) in MIGRATIONS {
            if *version > current {
                Self::apply(&mut conn, *version, description, statements).await?;
            }
        }

        Ok(())
    }

    async fn apply(
        conn: &mut SqliteConnection,
        version: i64,
        description: &str,
        statements: &[&str],
    ) -> Result<()> {
        tracing::info!(version, description, "Applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed(format!("Failed to begin migration v{version}")))?;

        let result = async {
            for statement in statements {
                sqlx::query(*statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(migration_failed(format!("Migration v{version} failed")))?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await
                .map_err(migration_failed(format!("Failed to record migration v{version}")))?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed(format!("Failed to commit migration v{version}")))?;

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
