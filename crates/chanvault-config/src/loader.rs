// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chanvault.toml` > `~/.config/chanvault/chanvault.toml`
//! > `/etc/chanvault/chanvault.toml` with environment variable overrides via
//! the `CHANVAULT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ChanvaultConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chanvault/chanvault.toml` (system-wide)
/// 3. `~/.config/chanvault/chanvault.toml` (user XDG config)
/// 4. `./chanvault.toml` (local directory)
/// 5. `CHANVAULT_*` environment variables
pub fn load_config() -> Result<ChanvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChanvaultConfig::default()))
        .merge(Toml::file("/etc/chanvault/chanvault.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chanvault/chanvault.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chanvault.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ChanvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChanvaultConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChanvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChanvaultConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChanvaultConfig::default()))
        .merge(Toml::file("/etc/chanvault/chanvault.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chanvault/chanvault.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chanvault.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHANVAULT_ACCOUNT_API_HASH` must map to
/// `account.api_hash`, not `account.api.hash`.
fn env_provider() -> Env {
    Env::prefixed("CHANVAULT_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CHANVAULT_CRAWL_PAGE_SIZE -> "crawl_page_size"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("account_", "account.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("crawl_", "crawl.", 1)
            .replacen("filter_", "filter.", 1)
            .replacen("daemon_", "daemon.", 1);
        mapped.into()
    })
}
