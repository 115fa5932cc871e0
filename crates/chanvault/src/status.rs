// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic status reporting for the crawl daemon.
//!
//! Logs one structured line per in-flight download on a fixed interval,
//! with the file name, percent complete, and human-readable sizes.

use std::sync::Arc;
use std::time::Duration;

use byte_unit::{Byte, UnitType};
use tokio_util::sync::CancellationToken;
use tracing::info;

use chanvault_crawler::CrawlerContext;

/// Run the status reporter until shutdown.
pub async fn report_loop(ctx: Arc<CrawlerContext>, cancel: CancellationToken) {
    let secs = ctx.config.daemon.status_interval_secs;
    if secs == 0 {
        return;
    }
    let interval = Duration::from_secs(secs);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        for line in ctx.status() {
            if !line.downloading {
                continue;
            }
            info!(
                channel = %line.channel_id,
                title = %line.title,
                file = %line.file_name,
                queued = line.queued,
                progress = %format_progress(line.bytes, line.total),
                "downloading"
            );
        }
    }
}

/// `42.00% (4.20 MB/10.00 MB)`, or bytes-so-far when the total is unknown.
fn format_progress(bytes: i64, total: i64) -> String {
    if total > 0 {
        let percent = bytes as f64 / total as f64 * 100.0;
        format!(
            "{percent:.2}% ({}/{})",
            format_bytes(bytes),
            format_bytes(total)
        )
    } else {
        format_bytes(bytes)
    }
}

fn format_bytes(n: i64) -> String {
    let adjusted = Byte::from_u64(n.max(0) as u64).get_appropriate_unit(UnitType::Decimal);
    format!("{adjusted:.2}")
}
