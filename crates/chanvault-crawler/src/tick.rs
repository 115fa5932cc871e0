// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The periodic crawl tick.
//!
//! Each tick re-enumerates channels, applies the allow-list, fetches the
//! next history batch per channel from its resume floor, and appends the
//! results (with comment threads, best-effort) to the per-channel pending
//! queues. One channel's failure never blocks the others.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chanvault_core::{Backfill, ChannelInfo, ChanvaultError};
use chanvault_storage::queries::cursors;

use crate::pager;
use crate::runtime::CrawlerContext;

/// Run one crawl tick over every allowed channel.
///
/// Returns an error only when channel enumeration itself fails; per-channel
/// fetch failures are logged and isolated.
pub async fn crawl_tick(ctx: &Arc<CrawlerContext>) -> Result<(), ChanvaultError> {
    let channels = ctx.client.list_channels().await?;
    let backfill = Backfill::from_config(ctx.config.crawl.backfill);

    let mut queued_any = false;
    for info in &channels {
        if !is_allowed(info, &ctx.config.crawl.channels) {
            continue;
        }
        match tick_channel(ctx, info, backfill).await {
            Ok(added) => queued_any |= added,
            Err(e) => {
                warn!(channel = %info.id, error = %e, "channel tick failed");
            }
        }
    }

    if queued_any {
        ctx.work_available.notify_waiters();
    }
    Ok(())
}

/// Run crawl ticks on the configured interval until shutdown.
pub async fn run(ctx: Arc<CrawlerContext>, shutdown: CancellationToken) {
    let interval = Duration::from_secs(ctx.config.crawl.interval_secs);
    info!(interval_secs = interval.as_secs(), "crawl loop started");

    loop {
        if let Err(e) = crawl_tick(&ctx).await {
            warn!(error = %e, "crawl tick failed");
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("crawl loop stopped");
}

/// A channel is crawled when its id or its title appears in the allow-list.
fn is_allowed(info: &ChannelInfo, allow: &[String]) -> bool {
    allow
        .iter()
        .any(|entry| entry == &info.id || entry == &info.title)
}

/// Fetch and queue the next batch for one channel.
///
/// The resume floor is the durable cursor or, when higher, the id the tick
/// already queued this run, so consecutive ticks never re-queue messages
/// still waiting for download. Returns whether any work was queued.
async fn tick_channel(
    ctx: &Arc<CrawlerContext>,
    info: &ChannelInfo,
    backfill: Backfill,
) -> Result<bool, ChanvaultError> {
    let state = ctx.state_for(&info.id, &info.title);
    let cursor = cursors::ensure(&ctx.db, &info.id, &info.title).await?;
    let floor = cursor
        .last_message_id
        .max(state.last_fetched_id.load(Ordering::SeqCst));

    let page = pager::fetch_page(
        ctx.client.as_ref(),
        &info.id,
        floor,
        backfill,
        ctx.config.crawl.page_size,
    )
    .await?;

    if page.messages.is_empty() {
        // A never-crawled channel with nothing to collect (backfill of 0)
        // still gets its cursor seeded to the newest id.
        if floor == 0 && page.new_last_id > 0 {
            cursors::advance(&ctx.db, &info.id, page.new_last_id).await?;
            state
                .last_fetched_id
                .store(page.new_last_id, Ordering::SeqCst);
            debug!(channel = %info.id, seeded_to = page.new_last_id, "cursor seeded");
        }
        return Ok(false);
    }

    let mut batch = Vec::new();
    let mut max_main_id = floor;
    for msg in page.messages {
        max_main_id = max_main_id.max(msg.message_id);

        let replies = if ctx.config.crawl.include_comments && !msg.is_comment {
            // Comments are best-effort; a failed thread fetch degrades to
            // none rather than failing the channel.
            match ctx.client.fetch_replies(&msg).await {
                Ok(replies) => replies,
                Err(e) => {
                    debug!(channel = %info.id, message = msg.message_id, error = %e,
                        "reply fetch failed, skipping thread");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        batch.push(msg);
        batch.extend(replies);
    }

    let queued = batch.len();
    if let Ok(mut pending) = state.pending.lock() {
        pending.extend(batch);
    }
    state.last_fetched_id.store(max_main_id, Ordering::SeqCst);
    debug!(channel = %info.id, queued, fetched_to = max_main_id, "batch queued");
    Ok(queued > 0)
}
