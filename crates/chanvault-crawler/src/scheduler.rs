// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The download worker pool.
//!
//! `concurrency` workers share the channel map. Each claims the
//! least-recently-served channel with pending work, processes exactly one
//! queue-head message, and releases the channel. The claim flag gives
//! at-most-one concurrent download per channel; the pool size bounds the
//! global total.
//!
//! A message is popped only once it is fully handled (saved, filtered out,
//! deduplicated, or dead-lettered after `max_attempts` failures). A
//! transiently failed head stays in place, so a channel's messages are
//! always handled strictly in queue order.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chanvault_core::{ChanvaultError, DedupRecord, MediaItem, MediaKind, PendingMessage, ProgressSink};
use chanvault_storage::queries::{cursors, ledger};

use crate::paths;
use crate::runtime::{ChannelState, CrawlerContext};

/// Fallback wake-up for idle workers, in case a notify is missed.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Spawn the download worker pool.
pub fn spawn_workers(
    ctx: &Arc<CrawlerContext>,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..ctx.config.crawl.concurrency)
        .map(|worker| {
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(worker_loop(ctx, worker, shutdown))
        })
        .collect()
}

async fn worker_loop(ctx: Arc<CrawlerContext>, worker: usize, shutdown: CancellationToken) {
    debug!(worker, "download worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match ctx.claim_next() {
            Some(state) => {
                if let Err(e) = process_head(&ctx, &state).await {
                    warn!(worker, channel = %state.channel_id, error = %e,
                        "processing queue head failed");
                }
                ctx.release(&state);
            }
            None => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ctx.work_available.notified() => {}
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
            }
        }
    }
    debug!(worker, "download worker stopped");
}

/// Handle the claimed channel's queue head: dedup, filter, download.
///
/// Exposed for tests; production code reaches it through the worker pool.
pub async fn process_head(
    ctx: &Arc<CrawlerContext>,
    state: &Arc<ChannelState>,
) -> Result<(), ChanvaultError> {
    let head = state
        .pending
        .lock()
        .ok()
        .and_then(|q| q.front().cloned());
    let Some(msg) = head else {
        return Ok(());
    };
    let key = msg.unique_key();

    // Idempotence: a message downloaded in an earlier run is simply passed
    // over, advancing the cursor as if it were handled now.
    if ledger::is_downloaded(&ctx.db, &key).await? {
        debug!(channel = %msg.channel_id, message = msg.message_id, "already downloaded");
        return finish(ctx, state, &msg).await;
    }

    let Some(media) = msg.media.clone() else {
        record_seen(ctx, &msg, &key).await?;
        return finish(ctx, state, &msg).await;
    };

    if !wanted(ctx, &msg, &media).await? {
        debug!(channel = %msg.channel_id, message = msg.message_id,
            kind = %media.kind, size = media.size_bytes, "filtered out");
        record_seen(ctx, &msg, &key).await?;
        return finish(ctx, state, &msg).await;
    }

    record_seen(ctx, &msg, &key).await?;

    match attempt_download(ctx, state, &msg, &media, &key).await {
        Ok(file_name) => {
            info!(channel = %msg.channel_id, message = msg.message_id,
                file = %file_name, "media saved");
            finish(ctx, state, &msg).await
        }
        Err(e) => {
            let attempts = state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempts >= ctx.config.crawl.max_attempts {
                // Dead-letter: give the rest of the channel a chance instead
                // of wedging on one poisoned message. The ledger row stays
                // without a save path as the skip marker.
                warn!(channel = %msg.channel_id, message = msg.message_id,
                    attempts, error = %e, "giving up on message");
                finish(ctx, state, &msg).await
            } else {
                warn!(channel = %msg.channel_id, message = msg.message_id,
                    attempt = attempts, error = %e, "download failed, will retry");
                Ok(())
            }
        }
    }
}

/// Whether the media passes the channel's kind allow-list and size filter.
async fn wanted(
    ctx: &Arc<CrawlerContext>,
    msg: &PendingMessage,
    media: &MediaItem,
) -> Result<bool, ChanvaultError> {
    if media.kind != MediaKind::Unrecognized {
        let cursor = cursors::load(&ctx.db, &msg.channel_id).await?;
        if !cursor.media_types.contains(&media.kind) {
            return Ok(false);
        }
    }
    Ok(ctx.filter.accepts(&msg.channel_id, media))
}

/// One download attempt: stream bytes, write them to the deterministic
/// destination, and mark the ledger row downloaded.
async fn attempt_download(
    ctx: &Arc<CrawlerContext>,
    state: &Arc<ChannelState>,
    msg: &PendingMessage,
    media: &MediaItem,
    key: &str,
) -> Result<String, ChanvaultError> {
    let (file_name, path) = paths::destination_path(&ctx.config.storage.media_dir, msg, media);

    if let Ok(mut current) = state.progress.file_name.lock() {
        *current = file_name.clone();
    }
    state.progress.bytes.store(0, Ordering::SeqCst);
    state
        .progress
        .total
        .store(media.size_bytes.unwrap_or(0), Ordering::SeqCst);

    let sink: ProgressSink = {
        let state = state.clone();
        Arc::new(move |done, total| {
            state.progress.bytes.store(done, Ordering::SeqCst);
            if total > 0 {
                state.progress.total.store(total, Ordering::SeqCst);
            }
        })
    };

    let bytes = ctx.client.download(msg, sink).await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ChanvaultError::download("creating media directory", e))?;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ChanvaultError::download("writing media file", e))?;

    ledger::mark_downloaded(&ctx.db, key, &file_name, &path.to_string_lossy()).await?;
    Ok(file_name)
}

/// Insert the message's dedup row, carrying the raw snapshot when the
/// operator opted in.
async fn record_seen(
    ctx: &Arc<CrawlerContext>,
    msg: &PendingMessage,
    key: &str,
) -> Result<(), ChanvaultError> {
    let record = DedupRecord {
        unique_key: key.to_string(),
        channel_id: msg.channel_id.clone(),
        message_id: msg.message_id,
        file_name: msg.media.as_ref().and_then(|m| m.file_name.clone()),
        save_path: None,
        raw_message: if ctx.config.crawl.persist_raw {
            msg.raw.clone()
        } else {
            None
        },
    };
    ledger::record_seen(&ctx.db, &record).await?;
    Ok(())
}

/// Pop the fully-handled head and advance the durable cursor.
///
/// Comment messages never advance the cursor; only a main-timeline message
/// being fully handled moves the channel's resume position.
async fn finish(
    ctx: &Arc<CrawlerContext>,
    state: &Arc<ChannelState>,
    msg: &PendingMessage,
) -> Result<(), ChanvaultError> {
    if let Ok(mut pending) = state.pending.lock() {
        pending.pop_front();
    }
    state.attempts.store(0, Ordering::SeqCst);
    if let Ok(mut current) = state.progress.file_name.lock() {
        current.clear();
    }

    if !msg.is_comment {
        cursors::advance(&ctx.db, &msg.channel_id, msg.message_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanvault_config::ChanvaultConfig;
    use chanvault_core::ChannelInfo;
    use chanvault_storage::Database;
    use chanvault_test_utils::MockClient;
    use tempfile::tempdir;

    fn message(channel: &str, id: i64) -> PendingMessage {
        PendingMessage {
            channel_id: channel.to_string(),
            topic_id: None,
            grouped_id: None,
            message_id: id,
            is_comment: false,
            comment_channel_id: None,
            media: Some(MediaItem {
                kind: MediaKind::Photo,
                size_bytes: Some(10),
                file_name: None,
                mime_type: None,
            }),
            raw: Some(r#"{"id":1}"#.to_string()),
        }
    }

    async fn harness(
        config_tweak: impl FnOnce(&mut ChanvaultConfig),
    ) -> (Arc<MockClient>, Arc<CrawlerContext>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let mut config = ChanvaultConfig::default();
        config.storage.media_dir = dir.path().join("media").to_string_lossy().into_owned();
        config.crawl.channels = vec!["chan-1".to_string()];
        config_tweak(&mut config);
        let client = Arc::new(MockClient::new());
        client
            .add_channel(ChannelInfo {
                id: "chan-1".to_string(),
                title: "t".to_string(),
                is_forum: false,
                topics: Vec::new(),
            })
            .await;
        let ctx = Arc::new(CrawlerContext::new(client.clone(), db, config).unwrap());
        (client, ctx, dir)
    }

    async fn queue_one(ctx: &Arc<CrawlerContext>, msg: PendingMessage) -> Arc<ChannelState> {
        let state = ctx.state_for(&msg.channel_id, "t");
        cursors::ensure(&ctx.db, &msg.channel_id, "t").await.unwrap();
        state.pending.lock().unwrap().push_back(msg);
        state
    }

    #[tokio::test]
    async fn successful_download_saves_and_advances() {
        let (_client, ctx, dir) = harness(|_| {}).await;
        let state = queue_one(&ctx, message("chan-1", 5)).await;

        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 5);

        let saved = dir.path().join("media/chan-1/chan-1_5.jpg");
        assert_eq!(std::fs::read(&saved).unwrap(), b"media-chan-1-5");

        let key = message("chan-1", 5).unique_key();
        assert!(ledger::is_downloaded(&ctx.db, &key).await.unwrap());
    }

    #[tokio::test]
    async fn comment_message_never_advances_cursor() {
        let (_client, ctx, _dir) = harness(|_| {}).await;
        let mut msg = message("chan-1", 42);
        msg.is_comment = true;
        msg.comment_channel_id = Some("discussion-1".to_string());
        let state = queue_one(&ctx, msg).await;

        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 0);
    }

    #[tokio::test]
    async fn transient_failure_keeps_head_in_place() {
        let (client, ctx, _dir) = harness(|_| {}).await;
        let msg = message("chan-1", 5);
        client.fail_next_downloads(&msg.unique_key(), 1).await;
        let state = queue_one(&ctx, msg).await;

        process_head(&ctx, &state).await.unwrap();
        assert_eq!(state.queued(), 1);
        assert_eq!(state.attempts.load(Ordering::SeqCst), 1);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 0);

        // Next attempt succeeds and drains the head.
        process_head(&ctx, &state).await.unwrap();
        assert_eq!(state.queued(), 0);
    }

    #[tokio::test]
    async fn dead_letter_after_max_attempts() {
        let (client, ctx, _dir) = harness(|c| c.crawl.max_attempts = 3).await;
        let msg = message("chan-1", 5);
        let key = msg.unique_key();
        client.fail_next_downloads(&key, 10).await;
        let state = queue_one(&ctx, msg).await;

        for _ in 0..3 {
            process_head(&ctx, &state).await.unwrap();
        }

        // Dead-lettered: popped, cursor advanced, ledger row without a path.
        assert_eq!(state.queued(), 0);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 5);
        let row = ledger::lookup(&ctx.db, &key).await.unwrap().unwrap();
        assert!(row.save_path.is_none());
        assert_eq!(client.download_count(&key).await, 3);
    }

    #[tokio::test]
    async fn already_downloaded_message_is_skipped_without_redownload() {
        let (client, ctx, _dir) = harness(|_| {}).await;
        let msg = message("chan-1", 5);
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg.clone()).await;

        process_head(&ctx, &state).await.unwrap();
        assert_eq!(client.download_count(&key).await, 1);

        // Re-queue the same message (as a replayed crawl would).
        state.pending.lock().unwrap().push_back(msg);
        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        assert_eq!(client.download_count(&key).await, 1);
    }

    #[tokio::test]
    async fn filtered_message_is_recorded_but_not_downloaded() {
        let (client, ctx, _dir) = harness(|c| {
            c.filter.photo = Some(chanvault_config::SizeRule {
                min: Some("1000B".to_string()),
                max: Some("2000B".to_string()),
            });
        })
        .await;
        let mut msg = message("chan-1", 5);
        if let Some(media) = msg.media.as_mut() {
            media.size_bytes = Some(500);
        }
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg).await;

        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        assert_eq!(client.download_count(&key).await, 0);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 5);
        let row = ledger::lookup(&ctx.db, &key).await.unwrap().unwrap();
        assert!(row.save_path.is_none());
    }

    #[tokio::test]
    async fn kind_outside_channel_allow_list_is_skipped() {
        let (client, ctx, _dir) = harness(|_| {}).await;
        let msg = message("chan-1", 5);
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg).await;

        // Restrict the channel to videos only.
        let videos_only = [MediaKind::Video].into_iter().collect();
        cursors::set_media_types(&ctx.db, "chan-1", &videos_only)
            .await
            .unwrap();

        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        assert_eq!(client.download_count(&key).await, 0);
    }

    #[tokio::test]
    async fn raw_snapshot_persisted_only_when_opted_in() {
        let (_client, ctx, _dir) = harness(|c| c.crawl.persist_raw = true).await;
        let msg = message("chan-1", 5);
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg).await;
        process_head(&ctx, &state).await.unwrap();

        let row = ledger::lookup(&ctx.db, &key).await.unwrap().unwrap();
        assert_eq!(row.raw_message.as_deref(), Some(r#"{"id":1}"#));

        let (_client, ctx, _dir) = harness(|_| {}).await;
        let msg = message("chan-1", 6);
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg).await;
        process_head(&ctx, &state).await.unwrap();

        let row = ledger::lookup(&ctx.db, &key).await.unwrap().unwrap();
        assert!(row.raw_message.is_none());
    }

    #[tokio::test]
    async fn message_without_media_is_recorded_and_advanced() {
        let (_client, ctx, _dir) = harness(|_| {}).await;
        let mut msg = message("chan-1", 7);
        msg.media = None;
        let key = msg.unique_key();
        let state = queue_one(&ctx, msg).await;

        process_head(&ctx, &state).await.unwrap();

        assert_eq!(state.queued(), 0);
        let cursor = cursors::load(&ctx.db, "chan-1").await.unwrap();
        assert_eq!(cursor.last_message_id, 7);
        assert!(ledger::lookup(&ctx.db, &key).await.unwrap().is_some());
    }
}
