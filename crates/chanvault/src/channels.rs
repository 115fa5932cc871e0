// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chanvault channels` command implementation.
//!
//! Connects with the configured account and prints every reachable channel
//! with its crawl cursor and downloaded-media count, so the operator can
//! pick ids for the `crawl.channels` allow-list.

use std::collections::HashMap;

use chanvault_config::ChanvaultConfig;
use chanvault_core::ChanvaultError;
use chanvault_core::ChannelClient;
use chanvault_storage::queries::{cursors, ledger};
use chanvault_storage::Database;
use chanvault_telegram::TelegramClient;

/// Run the `chanvault channels` command.
pub async fn run_channels(config: &ChanvaultConfig) -> Result<(), ChanvaultError> {
    let missing = config.missing_for_crawl();
    if missing.contains(&"account.api_id")
        || missing.contains(&"account.api_hash")
        || missing.contains(&"account.phone")
    {
        return Err(ChanvaultError::Config(format!(
            "account credentials are required to list channels (missing: {})",
            missing.join(", ")
        )));
    }

    let client = TelegramClient::connect(&config.account).await?;
    let channels = client.list_channels().await?;

    let db = Database::open_with_options(&config.storage.database_path, config.storage.wal_mode)
        .await?;
    let cursors: HashMap<String, i64> = cursors::list(&db)
        .await?
        .into_iter()
        .map(|(cursor, _title)| (cursor.channel_id.clone(), cursor.last_message_id))
        .collect();
    let downloaded: HashMap<String, i64> =
        ledger::downloaded_counts(&db).await?.into_iter().collect();

    println!(
        "{:<16} {:<32} {:>6} {:>12} {:>10}",
        "ID", "TITLE", "FORUM", "CURSOR", "DOWNLOADED"
    );
    for channel in channels {
        let forum = if channel.is_forum {
            format!("{} topics", channel.topics.len())
        } else {
            "-".to_string()
        };
        println!(
            "{:<16} {:<32} {:>6} {:>12} {:>10}",
            channel.id,
            truncate(&channel.title, 32),
            forum,
            cursors.get(&channel.id).copied().unwrap_or(0),
            downloaded.get(&channel.id).copied().unwrap_or(0),
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    }
}
