// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The collaborator seam: everything the crawler needs from the remote
//! messaging service, reduced to four verbs.
//!
//! The concrete implementation owns connect/login, session persistence, and
//! the service's own retry and rate-limit handling. The crawler core never
//! sees protocol types.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChanvaultError;
use crate::types::{ChannelInfo, PendingMessage};

/// Callback reporting `(bytes_so_far, total_bytes)` during a download.
/// `total_bytes` is 0 when the service does not report a size.
pub type ProgressSink = Arc<dyn Fn(i64, i64) + Send + Sync>;

/// Client for one remote messaging service account.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Enumerate the channels reachable by this account, ordered, with the
    /// operator's own saved-notes pseudo-channel prepended.
    ///
    /// Topic resolution is per-channel best-effort: a failure to resolve one
    /// channel's topics yields `topics = []` for that channel and must not
    /// fail the rest of the enumeration.
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChanvaultError>;

    /// Fetch one raw page of channel history, NEWEST-first as the service
    /// returns it. Chronological reversal and resume-mode selection are the
    /// crawler pager's responsibility.
    ///
    /// Positional window semantics: with the channel's messages laid out
    /// newest-first, let `base` be the index of the first message strictly
    /// older than `offset_id` (`base = 0` when `offset_id` is 0). The page is
    /// the slice `[base + add_offset, base + add_offset + limit)`, clamped to
    /// the valid range. A negative `add_offset` therefore reaches messages
    /// newer than `offset_id`.
    async fn history_page(
        &self,
        channel_id: &str,
        offset_id: i64,
        add_offset: i64,
        limit: usize,
    ) -> Result<Vec<PendingMessage>, ChanvaultError>;

    /// Fetch the comment thread attached to one main-channel message.
    /// Comments are best-effort: callers degrade errors to an empty list.
    async fn fetch_replies(
        &self,
        message: &PendingMessage,
    ) -> Result<Vec<PendingMessage>, ChanvaultError>;

    /// Stream the message's media bytes, reporting progress through `sink`.
    async fn download(
        &self,
        message: &PendingMessage,
        sink: ProgressSink,
    ) -> Result<Vec<u8>, ChanvaultError>;
}
