// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chanvault serve` command implementation.
//!
//! Holds until the configuration is complete, connects the Telegram client
//! (interactive login on first run), opens storage, then runs the crawl
//! tick loop alongside the download worker pool and the status reporter
//! until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use chanvault_config::ChanvaultConfig;
use chanvault_core::ChanvaultError;
use chanvault_crawler::runtime::CrawlerContext;
use chanvault_crawler::{scheduler, tick};
use chanvault_storage::Database;
use chanvault_telegram::TelegramClient;

use crate::shutdown;
use crate::status;

/// How often the hold loop re-reads an incomplete configuration.
const HOLD_POLL: Duration = Duration::from_secs(5);

/// Runs the `chanvault serve` command.
pub async fn run_serve(config: ChanvaultConfig) -> Result<(), ChanvaultError> {
    info!("starting chanvault serve");

    let cancel = shutdown::install_signal_handler();

    // An incomplete configuration holds the daemon rather than exiting, so
    // the operator can fill in credentials while it waits.
    let config = tokio::select! {
        config = hold_until_complete(config) => config,
        _ = cancel.cancelled() => {
            info!("shutdown requested while waiting for configuration");
            return Ok(());
        }
    };

    let client = TelegramClient::connect(&config.account).await?;
    let db = Database::open_with_options(
        &config.storage.database_path,
        config.storage.wal_mode,
    )
    .await?;
    info!(
        database = %config.storage.database_path,
        media_dir = %config.storage.media_dir,
        channels = config.crawl.channels.len(),
        "storage ready"
    );

    let ctx = Arc::new(CrawlerContext::new(Arc::new(client), db, config)?);

    let workers = scheduler::spawn_workers(&ctx, &cancel);
    let reporter = tokio::spawn(status::report_loop(ctx.clone(), cancel.clone()));

    tick::run(ctx.clone(), cancel.clone()).await;

    for handle in workers {
        let _ = handle.await;
    }
    let _ = reporter.await;

    info!("chanvault serve shutdown complete");
    Ok(())
}

/// Re-read the configuration every few seconds until crawling can start.
async fn hold_until_complete(mut config: ChanvaultConfig) -> ChanvaultConfig {
    loop {
        let missing = config.missing_for_crawl();
        if missing.is_empty() {
            return config;
        }
        warn!(
            missing = ?missing,
            "configuration incomplete; edit the config file, the daemon is waiting"
        );
        tokio::time::sleep(HOLD_POLL).await;

        match chanvault_config::load_and_validate() {
            Ok(fresh) => config = fresh,
            Err(errors) => {
                warn!(errors = errors.len(), "configuration invalid; still waiting");
            }
        }
    }
}
