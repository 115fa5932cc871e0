// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resume-aware history paging.
//!
//! Three fetch modes over the service's positional history windows:
//!
//! 1. **Incremental** (cursor > 0): the page of messages immediately newer
//!    than the cursor, excluding the cursor message itself.
//! 2. **Full backfill** (cursor == 0, backfill full): probe the single
//!    oldest message; subsequent ticks continue incrementally from there.
//! 3. **Recent backfill** (cursor == 0, backfill n): walk pages from the
//!    newest message until `n` are collected; `n == 0` only learns the
//!    newest id so the cursor can be seeded.
//!
//! Pages come back newest-first from the service; callers receive messages
//! oldest-first so queue order matches timeline order.

use chanvault_core::{Backfill, ChannelClient, ChanvaultError, FetchedPage};
use tracing::trace;

/// Fetch the next batch of main-timeline messages for a channel.
///
/// `last_id` is the effective resume floor (persisted cursor or the highest
/// id already queued this run). Returned messages are strictly newer than
/// `last_id`, oldest-first. `new_last_id` carries the newest id observed,
/// for cursor seeding when the message list is empty.
pub async fn fetch_page(
    client: &dyn ChannelClient,
    channel_id: &str,
    last_id: i64,
    backfill: Backfill,
    page_size: usize,
) -> Result<FetchedPage, ChanvaultError> {
    if last_id > 0 {
        return fetch_incremental(client, channel_id, last_id, page_size).await;
    }
    match backfill {
        Backfill::Full => fetch_oldest(client, channel_id).await,
        Backfill::Recent(n) => fetch_recent(client, channel_id, n, page_size).await,
    }
}

/// Mode 1: the `page_size` messages immediately newer than `last_id`.
///
/// With the newest-first layout, `add_offset = -1 - limit` positions the
/// window so it ends just above `last_id`, excluding `last_id` itself.
async fn fetch_incremental(
    client: &dyn ChannelClient,
    channel_id: &str,
    last_id: i64,
    page_size: usize,
) -> Result<FetchedPage, ChanvaultError> {
    let add_offset = -1 - page_size as i64;
    let page = client
        .history_page(channel_id, last_id, add_offset, page_size)
        .await?;

    // Clamping at the window edge can let the cursor message itself slip in.
    let mut messages: Vec<_> = page
        .into_iter()
        .filter(|m| m.message_id > last_id)
        .collect();
    messages.reverse();

    let new_last_id = messages.last().map(|m| m.message_id).unwrap_or(last_id);
    trace!(channel = channel_id, count = messages.len(), "incremental page");
    Ok(FetchedPage {
        new_last_id,
        messages,
    })
}

/// Mode 2: the single oldest message in the channel.
///
/// `offset_id = 1` places the base past every message; `add_offset = -1`
/// backs the one-message window up onto the oldest.
async fn fetch_oldest(
    client: &dyn ChannelClient,
    channel_id: &str,
) -> Result<FetchedPage, ChanvaultError> {
    let page = client.history_page(channel_id, 1, -1, 1).await?;
    let new_last_id = page.first().map(|m| m.message_id).unwrap_or(0);
    trace!(channel = channel_id, found = !page.is_empty(), "oldest probe");
    Ok(FetchedPage {
        new_last_id,
        messages: page,
    })
}

/// Mode 3: the newest `n` messages, oldest-first.
///
/// Walks positional windows down from the top of the channel. `n == 0`
/// returns no messages but still reports the newest id for seeding.
async fn fetch_recent(
    client: &dyn ChannelClient,
    channel_id: &str,
    n: u32,
    page_size: usize,
) -> Result<FetchedPage, ChanvaultError> {
    let mut newest_first = Vec::new();
    let mut newest_id = 0;
    let want = n as usize;
    let mut page_index: i64 = 0;

    loop {
        let limit = if want == 0 { 1 } else { page_size };
        let page = client
            .history_page(channel_id, 0, page_index * limit as i64, limit)
            .await?;
        let got = page.len();
        if let Some(first) = page.first()
            && newest_id == 0
        {
            newest_id = first.message_id;
        }
        newest_first.extend(page);

        if want == 0 || newest_first.len() >= want || got < limit {
            break;
        }
        page_index += 1;
    }

    newest_first.truncate(want);
    let mut messages = newest_first;
    messages.reverse();

    // Seed from the newest collected message when any were taken, so the
    // cursor matches what actually entered the queue.
    let new_last_id = messages.last().map(|m| m.message_id).unwrap_or(newest_id);
    trace!(channel = channel_id, count = messages.len(), "recent backfill");
    Ok(FetchedPage {
        new_last_id,
        messages,
    })
}
