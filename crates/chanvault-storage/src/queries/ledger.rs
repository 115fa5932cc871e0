// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup ledger operations.
//!
//! The ledger is the source of truth for "have we handled this message
//! already". A row is inserted when a message is first taken up (optionally
//! carrying the raw message snapshot), and its `save_path` is filled in once
//! the media has been written to disk. Rows without a `save_path` are
//! messages that were seen but not downloaded (filtered out, no media, or
//! dead-lettered after repeated failures).

use chanvault_core::{ChanvaultError, DedupRecord};
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Record that a message has been taken up.
///
/// Idempotent: returns `true` when this call inserted the row, `false` when
/// the message was already in the ledger.
pub async fn record_seen(db: &Database, record: &DedupRecord) -> Result<bool, ChanvaultError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO media_ledger
                 (unique_key, channel_id, message_id, file_name, save_path, raw_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.unique_key,
                    record.channel_id,
                    record.message_id,
                    record.file_name,
                    record.save_path,
                    record.raw_message,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a ledger row as downloaded, recording where the media was saved.
pub async fn mark_downloaded(
    db: &Database,
    unique_key: &str,
    file_name: &str,
    save_path: &str,
) -> Result<(), ChanvaultError> {
    let unique_key = unique_key.to_string();
    let file_name = file_name.to_string();
    let save_path = save_path.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE media_ledger SET file_name = ?2, save_path = ?3
                 WHERE unique_key = ?1",
                params![unique_key, file_name, save_path],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a ledger row by unique key.
pub async fn lookup(db: &Database, unique_key: &str) -> Result<Option<DedupRecord>, ChanvaultError> {
    let key = unique_key.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT unique_key, channel_id, message_id, file_name, save_path, raw_message
                 FROM media_ledger WHERE unique_key = ?1",
                params![key],
                |row| {
                    Ok(DedupRecord {
                        unique_key: row.get(0)?,
                        channel_id: row.get(1)?,
                        message_id: row.get(2)?,
                        file_name: row.get(3)?,
                        save_path: row.get(4)?,
                        raw_message: row.get(5)?,
                    })
                },
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a message's media has already been saved to disk.
pub async fn is_downloaded(db: &Database, unique_key: &str) -> Result<bool, ChanvaultError> {
    let key = unique_key.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM media_ledger
                 WHERE unique_key = ?1 AND save_path IS NOT NULL",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Count downloaded media, total and per channel.
pub async fn downloaded_counts(db: &Database) -> Result<Vec<(String, i64)>, ChanvaultError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, COUNT(*) FROM media_ledger
                 WHERE save_path IS NOT NULL
                 GROUP BY channel_id ORDER BY channel_id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn record(key: &str, channel: &str, id: i64) -> DedupRecord {
        DedupRecord {
            unique_key: key.to_string(),
            channel_id: channel.to_string(),
            message_id: id,
            file_name: None,
            save_path: None,
            raw_message: None,
        }
    }

    #[tokio::test]
    async fn record_seen_is_idempotent() {
        let (db, _dir) = setup_db().await;

        let rec = record("key-1", "chan-1", 10);
        assert!(record_seen(&db, &rec).await.unwrap());
        assert!(!record_seen(&db, &rec).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_original_row() {
        let (db, _dir) = setup_db().await;

        let mut rec = record("key-1", "chan-1", 10);
        rec.raw_message = Some("original".to_string());
        record_seen(&db, &rec).await.unwrap();

        let mut replay = record("key-1", "chan-1", 10);
        replay.raw_message = Some("replayed".to_string());
        record_seen(&db, &replay).await.unwrap();

        let stored = lookup(&db, "key-1").await.unwrap().unwrap();
        assert_eq!(stored.raw_message.as_deref(), Some("original"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_downloaded_sets_path_and_name() {
        let (db, _dir) = setup_db().await;

        record_seen(&db, &record("key-1", "chan-1", 10)).await.unwrap();
        assert!(!is_downloaded(&db, "key-1").await.unwrap());

        mark_downloaded(&db, "key-1", "chan-1_10.jpg", "/media/chan-1/chan-1_10.jpg")
            .await
            .unwrap();

        assert!(is_downloaded(&db, "key-1").await.unwrap());
        let stored = lookup(&db, "key-1").await.unwrap().unwrap();
        assert_eq!(stored.file_name.as_deref(), Some("chan-1_10.jpg"));
        assert_eq!(
            stored.save_path.as_deref(),
            Some("/media/chan-1/chan-1_10.jpg")
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lookup_missing_key_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(lookup(&db, "absent").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn downloaded_counts_exclude_undownloaded_rows() {
        let (db, _dir) = setup_db().await;

        record_seen(&db, &record("k1", "chan-1", 1)).await.unwrap();
        record_seen(&db, &record("k2", "chan-1", 2)).await.unwrap();
        record_seen(&db, &record("k3", "chan-2", 3)).await.unwrap();
        mark_downloaded(&db, "k1", "a.jpg", "/m/a.jpg").await.unwrap();
        mark_downloaded(&db, "k3", "b.mp4", "/m/b.mp4").await.unwrap();

        let counts = downloaded_counts(&db).await.unwrap();
        assert_eq!(
            counts,
            vec![("chan-1".to_string(), 1), ("chan-2".to_string(), 1)]
        );

        db.close().await.unwrap();
    }
}
