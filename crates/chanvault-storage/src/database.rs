// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle and schema management.
//!
//! All access goes through a single `tokio-rusqlite` connection, which
//! serializes writes on a dedicated thread and so never observes
//! `SQLITE_BUSY` from within the process.

use std::path::Path;

use chanvault_core::ChanvaultError;
use tracing::debug;

/// The idempotent schema, applied on every open.
///
/// `channel_cursor` holds one row per known channel: the crawl position and
/// the media-type allow-list (CSV of kind names). `media_ledger` holds one
/// row per message ever handled, keyed by its content-addressed unique key;
/// a non-NULL `save_path` marks the download as complete.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS channel_cursor (
    channel_id      TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    last_message_id INTEGER NOT NULL DEFAULT 0,
    media_types     TEXT NOT NULL DEFAULT 'photo,video,audio,file'
);

CREATE TABLE IF NOT EXISTS media_ledger (
    unique_key  TEXT PRIMARY KEY,
    channel_id  TEXT NOT NULL,
    message_id  INTEGER NOT NULL,
    file_name   TEXT,
    save_path   TEXT,
    raw_message TEXT,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_media_ledger_channel
    ON media_ledger (channel_id, message_id);
";

/// Handle to the chanvault SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled.
    pub async fn open(path: &str) -> Result<Self, ChanvaultError> {
        Self::open_with_options(path, true).await
    }

    /// Open (or create) the database at `path`, optionally without WAL.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, ChanvaultError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ChanvaultError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the database, flushing WAL to the main file.
    pub async fn close(self) -> Result<(), ChanvaultError> {
        self.conn
            .close()
            .await
            .map_err(|e| ChanvaultError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a `tokio_rusqlite::Error` into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> ChanvaultError {
    ChanvaultError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();

        assert!(tables.contains(&"channel_cursor".to_string()));
        assert!(tables.contains(&"media_ledger".to_string()));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open re-applies the schema without error.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }
}
