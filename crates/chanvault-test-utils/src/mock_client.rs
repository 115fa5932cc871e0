// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel client for deterministic testing.
//!
//! `MockClient` implements `ChannelClient` over an in-memory message store
//! with the same positional history-window semantics as the live service,
//! plus failure injection and concurrency accounting for scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chanvault_core::{ChannelClient, ChanvaultError, ChannelInfo, PendingMessage, ProgressSink};

/// A mock messaging-service client for testing.
///
/// Messages are held per channel, sorted ascending by id; `history_page`
/// serves positional windows over the newest-first view exactly like the
/// live service. Downloads return `media-<channel>-<id>` as bytes and track
/// global and per-channel concurrency so tests can assert scheduling
/// invariants.
pub struct MockClient {
    channels: Mutex<Vec<ChannelInfo>>,
    /// Per channel, ascending by message_id.
    messages: Mutex<HashMap<String, Vec<PendingMessage>>>,
    /// Reply threads keyed by (channel_id, message_id).
    replies: Mutex<HashMap<(String, i64), Vec<PendingMessage>>>,
    /// Remaining injected failures per unique key.
    failures: Mutex<HashMap<String, u32>>,
    /// Download attempts per unique key.
    download_calls: Mutex<HashMap<String, u32>>,
    /// Artificial per-download delay, to force overlap in concurrency tests.
    download_delay: Mutex<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    active_per_channel: Mutex<HashMap<String, usize>>,
    channel_overlap: AtomicBool,
    history_calls: AtomicUsize,
}

impl MockClient {
    /// Create a new mock client with no channels.
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            messages: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            download_calls: Mutex::new(HashMap::new()),
            download_delay: Mutex::new(Duration::ZERO),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            active_per_channel: Mutex::new(HashMap::new()),
            channel_overlap: AtomicBool::new(false),
            history_calls: AtomicUsize::new(0),
        }
    }

    /// Register a channel for enumeration.
    pub async fn add_channel(&self, info: ChannelInfo) {
        self.channels.lock().await.push(info);
    }

    /// Add a message to its channel's timeline, kept sorted by id.
    pub async fn push_message(&self, msg: PendingMessage) {
        let mut store = self.messages.lock().await;
        let timeline = store.entry(msg.channel_id.clone()).or_default();
        timeline.push(msg);
        timeline.sort_by_key(|m| m.message_id);
    }

    /// Attach a reply-thread message to a main-timeline message.
    pub async fn add_reply(&self, channel_id: &str, message_id: i64, reply: PendingMessage) {
        self.replies
            .lock()
            .await
            .entry((channel_id.to_string(), message_id))
            .or_default()
            .push(reply);
    }

    /// Make the next `n` downloads of the message fail.
    pub async fn fail_next_downloads(&self, unique_key: &str, n: u32) {
        self.failures
            .lock()
            .await
            .insert(unique_key.to_string(), n);
    }

    /// Stall each download for `delay`, so concurrent downloads overlap.
    pub async fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().await = delay;
    }

    /// How many times the message's download was attempted.
    pub async fn download_count(&self, unique_key: &str) -> u32 {
        self.download_calls
            .lock()
            .await
            .get(unique_key)
            .copied()
            .unwrap_or(0)
    }

    /// Peak number of simultaneously active downloads observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Whether two downloads for the same channel ever overlapped.
    pub fn channel_overlap_detected(&self) -> bool {
        self.channel_overlap.load(Ordering::SeqCst)
    }

    /// Number of history pages served.
    pub fn history_call_count(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelClient for MockClient {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChanvaultError> {
        Ok(self.channels.lock().await.clone())
    }

    async fn history_page(
        &self,
        channel_id: &str,
        offset_id: i64,
        add_offset: i64,
        limit: usize,
    ) -> Result<Vec<PendingMessage>, ChanvaultError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        let store = self.messages.lock().await;
        let Some(timeline) = store.get(channel_id) else {
            return Ok(Vec::new());
        };

        // Newest-first view of the timeline.
        let newest_first: Vec<&PendingMessage> = timeline.iter().rev().collect();

        // Index of the first message strictly older than offset_id.
        let base = if offset_id == 0 {
            0i64
        } else {
            newest_first
                .iter()
                .position(|m| m.message_id < offset_id)
                .map(|p| p as i64)
                .unwrap_or(newest_first.len() as i64)
        };

        let start = (base + add_offset).max(0) as usize;
        let end = ((base + add_offset + limit as i64).max(0) as usize).min(newest_first.len());
        if start >= end {
            return Ok(Vec::new());
        }

        Ok(newest_first[start..end].iter().map(|m| (*m).clone()).collect())
    }

    async fn fetch_replies(
        &self,
        message: &PendingMessage,
    ) -> Result<Vec<PendingMessage>, ChanvaultError> {
        let replies = self.replies.lock().await;
        Ok(replies
            .get(&(message.channel_id.clone(), message.message_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn download(
        &self,
        message: &PendingMessage,
        sink: ProgressSink,
    ) -> Result<Vec<u8>, ChanvaultError> {
        let key = message.unique_key();
        {
            let mut calls = self.download_calls.lock().await;
            *calls.entry(key.clone()).or_insert(0) += 1;
        }

        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(current, Ordering::SeqCst);
        {
            let mut per_channel = self.active_per_channel.lock().await;
            let count = per_channel.entry(message.channel_id.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                self.channel_overlap.store(true, Ordering::SeqCst);
            }
        }

        let delay = *self.download_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let release = |client: &MockClient| {
            client.active.fetch_sub(1, Ordering::SeqCst);
        };

        let should_fail = {
            let mut failures = self.failures.lock().await;
            match failures.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        {
            let mut per_channel = self.active_per_channel.lock().await;
            if let Some(count) = per_channel.get_mut(&message.channel_id) {
                *count -= 1;
            }
        }

        if should_fail {
            release(self);
            return Err(ChanvaultError::Download {
                message: format!("injected failure for {key}"),
                source: None,
            });
        }

        let bytes = format!("media-{}-{}", message.channel_id, message.message_id).into_bytes();
        sink(bytes.len() as i64, bytes.len() as i64);
        release(self);
        Ok(bytes)
    }
}
