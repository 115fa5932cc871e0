// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chanvault integration tests.
//!
//! Provides a mock channel client for fast, deterministic, CI-runnable
//! tests without a live messaging service.

pub mod mock_client;

pub use mock_client::MockClient;
