// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel crawl cursor operations.
//!
//! A cursor row records the last fully-handled main-timeline message id and
//! the channel's media-type allow-list. Absent rows read as the zero-valued
//! cursor, so a channel seen for the first time starts from scratch.

use std::collections::BTreeSet;
use std::str::FromStr;

use chanvault_core::{ChanvaultError, Cursor, MediaKind};
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Load a channel's cursor, or the zero-valued cursor when the channel has
/// never been seen.
pub async fn load(db: &Database, channel_id: &str) -> Result<Cursor, ChanvaultError> {
    let channel = channel_id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT channel_id, last_message_id, media_types
                 FROM channel_cursor WHERE channel_id = ?1",
                params![channel],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)?;

    Ok(match row {
        Some((channel_id, last_message_id, media_types)) => Cursor {
            channel_id,
            last_message_id,
            media_types: media_types_from_csv(&media_types),
        },
        None => Cursor::absent(channel_id),
    })
}

/// Ensure a cursor row exists for the channel and refresh its title.
///
/// Inserting is idempotent; an existing row keeps its position and allow-list
/// but picks up the channel's current title.
pub async fn ensure(db: &Database, channel_id: &str, title: &str) -> Result<Cursor, ChanvaultError> {
    let channel = channel_id.to_string();
    let title = title.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_cursor (channel_id, title) VALUES (?1, ?2)
                 ON CONFLICT(channel_id) DO UPDATE SET title = excluded.title",
                params![channel, title],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    load(db, channel_id).await
}

/// Advance a channel's cursor to `message_id`.
///
/// Monotonic: a stale or replayed advance can never move the cursor
/// backwards.
pub async fn advance(db: &Database, channel_id: &str, message_id: i64) -> Result<(), ChanvaultError> {
    let channel = channel_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_cursor
                 SET last_message_id = MAX(last_message_id, ?2)
                 WHERE channel_id = ?1",
                params![channel, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a channel's media-type allow-list.
pub async fn set_media_types(
    db: &Database,
    channel_id: &str,
    media_types: &BTreeSet<MediaKind>,
) -> Result<(), ChanvaultError> {
    let channel = channel_id.to_string();
    let csv = media_types_to_csv(media_types);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_cursor SET media_types = ?2 WHERE channel_id = ?1",
                params![channel, csv],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List every known cursor, with channel titles, ordered by channel id.
pub async fn list(db: &Database) -> Result<Vec<(Cursor, String)>, ChanvaultError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, title, last_message_id, media_types
                 FROM channel_cursor ORDER BY channel_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
        .map(|rows| {
            rows.into_iter()
                .map(|(channel_id, title, last_message_id, media_types)| {
                    (
                        Cursor {
                            channel_id,
                            last_message_id,
                            media_types: media_types_from_csv(&media_types),
                        },
                        title,
                    )
                })
                .collect()
        })
}

/// Encode an allow-list as the stored CSV form.
fn media_types_to_csv(media_types: &BTreeSet<MediaKind>) -> String {
    media_types
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode the stored CSV form, skipping unrecognized tokens.
fn media_types_from_csv(csv: &str) -> BTreeSet<MediaKind> {
    csv.split(',')
        .filter_map(|token| MediaKind::from_str(token.trim()).ok())
        .collect()
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

    #[tokio::test]
    async fn load_unknown_channel_returns_absent_cursor() {
        let (db, _dir) = setup_db().await;

        let cursor = load(&db, "never-seen").await.unwrap();
        assert_eq!(cursor.last_message_id, 0);
        assert_eq!(cursor.media_types, MediaKind::full_set());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ensure_creates_row_with_full_allow_list() {
        let (db, _dir) = setup_db().await;

        let cursor = ensure(&db, "chan-1", "My Channel").await.unwrap();
        assert_eq!(cursor.channel_id, "chan-1");
        assert_eq!(cursor.last_message_id, 0);
        assert_eq!(cursor.media_types, MediaKind::full_set());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ensure_refreshes_title_but_keeps_position() {
        let (db, _dir) = setup_db().await;

        ensure(&db, "chan-1", "Old Title").await.unwrap();
        advance(&db, "chan-1", 42).await.unwrap();

        let cursor = ensure(&db, "chan-1", "New Title").await.unwrap();
        assert_eq!(cursor.last_message_id, 42);

        let listed = list(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1, "New Title");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn advance_is_monotonic() {
        let (db, _dir) = setup_db().await;

        ensure(&db, "chan-1", "t").await.unwrap();
        advance(&db, "chan-1", 100).await.unwrap();
        // A stale advance must not move the cursor backwards.
        advance(&db, "chan-1", 50).await.unwrap();

        let cursor = load(&db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 100);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_media_types_round_trips() {
        let (db, _dir) = setup_db().await;

        ensure(&db, "chan-1", "t").await.unwrap();
        let subset: BTreeSet<MediaKind> =
            [MediaKind::Photo, MediaKind::Video].into_iter().collect();
        set_media_types(&db, "chan-1", &subset).await.unwrap();

        let cursor = load(&db, "chan-1").await.unwrap();
        assert_eq!(cursor.media_types, subset);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn csv_decoding_skips_unknown_tokens() {
        let decoded = media_types_from_csv("photo, bogus ,video");
        let expected: BTreeSet<MediaKind> =
            [MediaKind::Photo, MediaKind::Video].into_iter().collect();
        assert_eq!(decoded, expected);
    }

    #[tokio::test]
    async fn list_orders_by_channel_id() {
        let (db, _dir) = setup_db().await;

        ensure(&db, "chan-b", "B").await.unwrap();
        ensure(&db, "chan-a", "A").await.unwrap();

        let listed = list(&db).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.channel_id, "chan-a");
        assert_eq!(listed[1].0.channel_id, "chan-b");

        db.close().await.unwrap();
    }
}
