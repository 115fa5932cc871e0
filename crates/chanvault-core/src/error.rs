// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the chanvault workspace.

use thiserror::Error;

/// The primary error type used across chanvault crates.
#[derive(Debug, Error)]
pub enum ChanvaultError {
    /// Configuration errors (invalid TOML, missing required fields, bad size ranges).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Remote client errors (connect, enumeration, page fetch).
    #[error("client error: {message}")]
    Client {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Media download errors (stream interrupted, write failure).
    #[error("download error: {message}")]
    Download {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChanvaultError {
    /// Wrap an arbitrary error as a client failure with context.
    pub fn client<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Client {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap an arbitrary error as a download failure with context.
    pub fn download<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Download {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
