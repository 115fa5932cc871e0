// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chanvault media crawler.
//!
//! This crate provides the shared data model, the error type, and the
//! [`ChannelClient`] trait that the remote-service adapter implements.

pub mod client;
pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use client::{ChannelClient, ProgressSink};
pub use error::ChanvaultError;
pub use types::{
    Backfill, ChannelInfo, Cursor, DedupRecord, FetchedPage, FilterRange, MediaItem, MediaKind,
    PendingMessage, TopicInfo,
};
