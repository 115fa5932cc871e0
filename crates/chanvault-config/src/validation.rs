// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive concurrency, page-size bounds, parseable
//! size strings, and a recognized log level.

use crate::diagnostic::ConfigError;
use crate::model::{ChanvaultConfig, SizeRuleSet};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Service-imposed ceiling on messages per history page.
const MAX_PAGE_SIZE: usize = 100;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ChanvaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.account.api_id < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "account.api_id must be non-negative, got {}",
                config.account.api_id
            ),
        });
    }

    if config.account.session_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "account.session_path must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.storage.media_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.media_dir must not be empty".to_string(),
        });
    }

    if config.crawl.interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "crawl.interval_secs must be at least 1".to_string(),
        });
    }

    if config.crawl.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "crawl.concurrency must be at least 1".to_string(),
        });
    }

    if config.crawl.page_size == 0 || config.crawl.page_size > MAX_PAGE_SIZE {
        errors.push(ConfigError::Validation {
            message: format!(
                "crawl.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                config.crawl.page_size
            ),
        });
    }

    if config.crawl.backfill < -1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "crawl.backfill must be -1 (full history) or a non-negative count, got {}",
                config.crawl.backfill
            ),
        });
    }

    if config.crawl.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "crawl.max_attempts must be at least 1".to_string(),
        });
    }

    let level = config.daemon.log_level.trim();
    if !VALID_LOG_LEVELS.contains(&level) {
        errors.push(ConfigError::Validation {
            message: format!(
                "daemon.log_level must be one of {}, got `{level}`",
                VALID_LOG_LEVELS.join(", ")
            ),
        });
    }

    validate_rule_set(&config.filter.defaults(), "filter", &mut errors);
    for (channel, rules) in &config.filter.channels {
        validate_rule_set(rules, &format!("filter.channels.{channel}"), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that every bound in a rule set parses as a byte size.
fn validate_rule_set(rules: &SizeRuleSet, prefix: &str, errors: &mut Vec<ConfigError>) {
    let kinds = [
        ("photo", &rules.photo),
        ("video", &rules.video),
        ("audio", &rules.audio),
        ("file", &rules.file),
    ];
    for (kind, rule) in kinds {
        if let Some(rule) = rule
            && let Err(message) = rule.to_range()
        {
            errors.push(ConfigError::Validation {
                message: format!("{prefix}.{kind}: {message}"),
            });
        }
    }
}
