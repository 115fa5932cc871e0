// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the chanvault crawler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use byte_unit::Byte;
use chanvault_core::FilterRange;
use serde::{Deserialize, Serialize};

/// Top-level chanvault configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values, but
/// the daemon stays idle until [account] credentials and a channel allow-list
/// are present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChanvaultConfig {
    /// Remote service account credentials and session settings.
    #[serde(default)]
    pub account: AccountConfig,

    /// Storage backend settings (database and media directory).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Crawl cadence, concurrency, paging, and backfill settings.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Media size filter rules, per kind and per channel.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Daemon logging and status-report settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl ChanvaultConfig {
    /// The settings that must be present before crawling can start.
    ///
    /// Returns the names of missing settings; empty means ready. The serve
    /// loop blocks and re-checks on this rather than exiting, so an operator
    /// can fill in the config while the daemon waits.
    pub fn missing_for_crawl(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.account.api_id <= 0 {
            missing.push("account.api_id");
        }
        if self
            .account
            .api_hash
            .as_deref()
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            missing.push("account.api_hash");
        }
        if self
            .account
            .phone
            .as_deref()
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            missing.push("account.phone");
        }
        if self.crawl.channels.is_empty() {
            missing.push("crawl.channels");
        }
        missing
    }
}

/// Remote service account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Application id issued by the service. 0 means unset.
    #[serde(default)]
    pub api_id: i32,

    /// Application hash issued by the service.
    #[serde(default)]
    pub api_hash: Option<String>,

    /// Phone number of the account to crawl with.
    #[serde(default)]
    pub phone: Option<String>,

    /// Path to the persisted login session file.
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: None,
            phone: None,
            session_path: default_session_path(),
        }
    }
}

fn default_session_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chanvault").join("chanvault.session"))
        .unwrap_or_else(|| std::path::PathBuf::from("chanvault.session"))
        .to_string_lossy()
        .into_owned()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Root directory downloaded media is saved under, one subdirectory
    /// per channel.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            media_dir: default_media_dir(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chanvault").join("chanvault.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chanvault.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_media_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("chanvault").join("media"))
        .unwrap_or_else(|| std::path::PathBuf::from("media"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Crawl cadence, concurrency, and backfill configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// Seconds between crawl ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Global bound on concurrent downloads across all channels.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Messages fetched per history page (service caps this at 100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How much history to collect the first time a channel is crawled:
    /// -1 means the full history, a non-negative value means the newest n
    /// messages (0 seeds the cursor without collecting anything).
    #[serde(default = "default_backfill")]
    pub backfill: i64,

    /// Channel allow-list. Only channels whose id or title appears here are
    /// crawled; empty means crawling stays idle.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Download attempts before a message is dead-lettered and skipped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Persist the raw message snapshot alongside each ledger row.
    #[serde(default)]
    pub persist_raw: bool,

    /// Also collect media from comment threads attached to channel posts.
    #[serde(default = "default_include_comments")]
    pub include_comments: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            concurrency: default_concurrency(),
            page_size: default_page_size(),
            backfill: default_backfill(),
            channels: Vec::new(),
            max_attempts: default_max_attempts(),
            persist_raw: false,
            include_comments: default_include_comments(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    5
}

fn default_page_size() -> usize {
    100
}

fn default_backfill() -> i64 {
    -1
}

fn default_max_attempts() -> u32 {
    5
}

fn default_include_comments() -> bool {
    true
}

/// Inclusive byte bounds for one media kind, as human-readable strings
/// (`"500KB"`, `"1.5 GiB"`). A missing bound is unbounded on that side.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SizeRule {
    #[serde(default)]
    pub min: Option<String>,

    #[serde(default)]
    pub max: Option<String>,
}

impl SizeRule {
    /// Parse both bounds into a byte range. Bounds may be given in either
    /// order; they are normalized.
    pub fn to_range(&self) -> Result<FilterRange, String> {
        let min = match self.min.as_deref() {
            Some(s) => parse_size(s)?,
            None => 0,
        };
        let max = match self.max.as_deref() {
            Some(s) => parse_size(s)?,
            None => i64::MAX,
        };
        Ok(FilterRange::normalized(min, max))
    }
}

/// Parse a human-readable byte size string into a byte count.
pub fn parse_size(input: &str) -> Result<i64, String> {
    let byte = Byte::parse_str(input, true)
        .map_err(|e| format!("invalid size `{input}`: {e}"))?;
    let value = byte.as_u128();
    if value > i64::MAX as u128 {
        return Err(format!("size `{input}` exceeds the supported maximum"));
    }
    Ok(value as i64)
}

/// Size rules for each media kind. A missing rule means no size restriction
/// for that kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SizeRuleSet {
    #[serde(default)]
    pub photo: Option<SizeRule>,

    #[serde(default)]
    pub video: Option<SizeRule>,

    #[serde(default)]
    pub audio: Option<SizeRule>,

    #[serde(default)]
    pub file: Option<SizeRule>,
}

/// Media size filter configuration.
///
/// The top-level rules apply to every channel; entries under `channels`
/// override them per channel id.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub photo: Option<SizeRule>,

    #[serde(default)]
    pub video: Option<SizeRule>,

    #[serde(default)]
    pub audio: Option<SizeRule>,

    #[serde(default)]
    pub file: Option<SizeRule>,

    /// Per-channel overrides, keyed by channel id.
    #[serde(default)]
    pub channels: HashMap<String, SizeRuleSet>,
}

impl FilterConfig {
    /// The channel-independent default rules as a rule set.
    pub fn defaults(&self) -> SizeRuleSet {
        SizeRuleSet {
            photo: self.photo.clone(),
            video: self.video.clone(),
            audio: self.audio.clone(),
            file: self.file.clone(),
        }
    }
}

/// Daemon logging and status-report configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between periodic download-progress status reports.
    /// 0 disables the reporter.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_status_interval_secs() -> u64 {
    30
}
