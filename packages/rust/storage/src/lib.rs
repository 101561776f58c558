//! libSQL storage layer for search runs and diversity tracking.
//!
//! The [`Storage`] struct wraps a local libSQL database holding:
//! - search runs and their aggregate insight
//! - enriched and failed companies per search, plus their contact people
//! - per-owner, per-niche seen domains and per-owner saved domains
//!
//! All writes go through [`Storage::open`]; [`Storage::open_readonly`] is for
//! inspection commands that must never mutate the database.

mod domains;
mod migrations;
mod searches;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use prospector_shared::{ProspectorError, Result};
use tokio::sync::{Mutex, MutexGuard};

pub use searches::{CompanyRecord, SearchRecord};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    /// Serializes writes so transactions from concurrent tasks never interleave
    /// on the shared connection.
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            write_lock: Mutex::new(()),
        };
        storage.enable_foreign_keys().await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            write_lock: Mutex::new(()),
        })
    }

    async fn enable_foreign_keys(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ProspectorError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            // Table doesn't exist yet
            Err(_) => 0,
        }
    }

    /// Ensure we're in read-write mode, then take the write lock.
    async fn begin_write(&self) -> Result<MutexGuard<'_, ()>> {
        if self.readonly {
            return Err(ProspectorError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(self.write_lock.lock().await)
    }
}

/// Map any libSQL error into a storage error.
pub(crate) fn db_err(e: impl std::fmt::Display) -> ProspectorError {
    ProspectorError::Storage(e.to_string())
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProspectorError::Storage(format!("invalid date '{raw}': {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;

    /// Create a temp file storage for testing.
    pub async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("prospector_test_{}.db", uuid::Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }
}
