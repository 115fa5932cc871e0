// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental crawl loop and bounded-concurrency download scheduler.
//!
//! The crawler runs two cooperating halves over a shared [`CrawlerContext`]:
//! a periodic tick that enumerates channels and appends newly fetched
//! messages to per-channel pending queues, and a pool of download workers
//! that drain those queues with at most one concurrent download per channel
//! and a global concurrency bound.

pub mod filter;
pub mod pager;
pub mod paths;
pub mod runtime;
pub mod scheduler;
pub mod tick;

pub use filter::FilterPolicy;
pub use runtime::{ChannelState, ChannelStatus, CrawlerContext};
