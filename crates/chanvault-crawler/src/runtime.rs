// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared crawl runtime state.
//!
//! [`CrawlerContext`] is the single structure both halves of the crawler
//! share: the tick appends to per-channel pending queues, workers claim
//! channels and drain them. Each mutable field has one writer role; locks
//! are held only for short, await-free sections.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Notify;
use tracing::debug;

use chanvault_config::ChanvaultConfig;
use chanvault_core::{ChannelClient, ChanvaultError, PendingMessage};
use chanvault_storage::Database;

use crate::filter::FilterPolicy;

/// Live download progress for one channel, read by the status reporter.
#[derive(Debug, Default)]
pub struct Progress {
    pub file_name: Mutex<String>,
    pub bytes: AtomicI64,
    pub total: AtomicI64,
}

/// Per-channel crawl state.
///
/// `pending` is appended by the tick and drained from the front by whichever
/// worker holds the channel's `downloading` flag. `last_fetched_id` is
/// written only by the tick so consecutive ticks append new pages without
/// re-queueing messages that are still pending.
pub struct ChannelState {
    pub channel_id: String,
    pub title: Mutex<String>,
    pub pending: Mutex<VecDeque<PendingMessage>>,
    /// Claim flag: true while a worker owns this channel's queue head.
    pub downloading: AtomicBool,
    /// When a worker last finished serving this channel, for fairness.
    pub last_served_at: Mutex<Instant>,
    /// Highest main-timeline id the tick has queued, ahead of the durable
    /// cursor until downloads complete.
    pub last_fetched_id: AtomicI64,
    /// Failed attempts on the current queue head.
    pub attempts: AtomicU32,
    pub progress: Progress,
}

impl ChannelState {
    fn new(channel_id: &str, title: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            title: Mutex::new(title.to_string()),
            pending: Mutex::new(VecDeque::new()),
            downloading: AtomicBool::new(false),
            last_served_at: Mutex::new(Instant::now()),
            last_fetched_id: AtomicI64::new(0),
            attempts: AtomicU32::new(0),
            progress: Progress::default(),
        }
    }

    /// Number of messages waiting in this channel's queue.
    pub fn queued(&self) -> usize {
        self.pending.lock().map(|q| q.len()).unwrap_or(0)
    }
}

/// A point-in-time view of one channel for status reporting.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    pub channel_id: String,
    pub title: String,
    pub queued: usize,
    pub downloading: bool,
    pub file_name: String,
    pub bytes: i64,
    pub total: i64,
}

/// Everything the tick, the workers, and the status reporter share.
pub struct CrawlerContext {
    pub client: Arc<dyn ChannelClient>,
    pub db: Database,
    pub config: ChanvaultConfig,
    pub filter: FilterPolicy,
    channels: Mutex<HashMap<String, Arc<ChannelState>>>,
    /// Wakes idle workers when the tick queues new work.
    pub work_available: Notify,
}

impl CrawlerContext {
    /// Build the runtime context, compiling the filter policy up front.
    pub fn new(
        client: Arc<dyn ChannelClient>,
        db: Database,
        config: ChanvaultConfig,
    ) -> Result<Self, ChanvaultError> {
        let filter = FilterPolicy::from_config(&config.filter)?;
        Ok(Self {
            client,
            db,
            config,
            filter,
            channels: Mutex::new(HashMap::new()),
            work_available: Notify::new(),
        })
    }

    /// The state for a channel, created on first sight.
    pub fn state_for(&self, channel_id: &str, title: &str) -> Arc<ChannelState> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let state = channels
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(ChannelState::new(channel_id, title)))
            .clone();
        if let Ok(mut t) = state.title.lock()
            && *t != title
        {
            *t = title.to_string();
        }
        state
    }

    /// Claim the least-recently-served channel that has pending work and no
    /// active download. Returns `None` when no channel is eligible.
    ///
    /// The returned channel's `downloading` flag is set; the caller must
    /// hand it back through [`release`](Self::release).
    pub fn claim_next(&self) -> Option<Arc<ChannelState>> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());

        let mut best: Option<(Instant, Arc<ChannelState>)> = None;
        for state in channels.values() {
            if state.downloading.load(Ordering::SeqCst) || state.queued() == 0 {
                continue;
            }
            let served = state
                .last_served_at
                .lock()
                .map(|i| *i)
                .unwrap_or_else(|_| Instant::now());
            match &best {
                Some((when, _)) if *when <= served => {}
                _ => best = Some((served, state.clone())),
            }
        }

        let (_, state) = best?;
        // Workers race between the scan and the claim; the flag decides.
        if state
            .downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!(channel = %state.channel_id, "channel claimed");
            Some(state)
        } else {
            None
        }
    }

    /// Hand a claimed channel back: update its fairness timestamp, clear the
    /// claim flag, and re-wake a worker if the queue still has work.
    pub fn release(&self, state: &ChannelState) {
        if let Ok(mut served) = state.last_served_at.lock() {
            *served = Instant::now();
        }
        state.downloading.store(false, Ordering::SeqCst);
        if state.queued() > 0 {
            self.work_available.notify_one();
        }
    }

    /// Snapshot every channel for the status reporter, ordered by id.
    pub fn status(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let mut lines: Vec<ChannelStatus> = channels
            .values()
            .map(|state| ChannelStatus {
                channel_id: state.channel_id.clone(),
                title: state
                    .title
                    .lock()
                    .map(|t| t.clone())
                    .unwrap_or_default(),
                queued: state.queued(),
                downloading: state.downloading.load(Ordering::SeqCst),
                file_name: state
                    .progress
                    .file_name
                    .lock()
                    .map(|f| f.clone())
                    .unwrap_or_default(),
                bytes: state.progress.bytes.load(Ordering::SeqCst),
                total: state.progress.total.load(Ordering::SeqCst),
            })
            .collect();
        lines.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        lines
    }
}
