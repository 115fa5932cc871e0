// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations over the chanvault schema.

pub mod cursors;
pub mod ledger;
