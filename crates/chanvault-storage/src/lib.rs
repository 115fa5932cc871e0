// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the chanvault media crawler.
//!
//! Provides WAL-mode SQLite storage with a single-writer concurrency model
//! via `tokio-rusqlite`, typed operations for per-channel crawl cursors, and
//! the idempotent dedup ledger that makes re-crawls and restarts safe.

pub mod database;
pub mod queries;

pub use database::Database;
