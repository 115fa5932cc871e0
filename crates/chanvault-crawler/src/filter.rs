// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Size filter policy, compiled once from configuration.
//!
//! The policy biases toward over-downloading: media with an unknown size or
//! an unrecognized kind is always accepted, and a kind with no configured
//! rule is unrestricted. Only a known size falling outside an applicable
//! range rejects a download.

use std::collections::{BTreeMap, HashMap};

use chanvault_config::model::{FilterConfig, SizeRuleSet};
use chanvault_core::{ChanvaultError, FilterRange, MediaItem, MediaKind};

/// Compiled size rules: defaults plus per-channel overrides.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    defaults: BTreeMap<MediaKind, FilterRange>,
    per_channel: HashMap<String, BTreeMap<MediaKind, FilterRange>>,
}

impl FilterPolicy {
    /// Compile the policy from configuration.
    ///
    /// Size strings are parsed here so a bad bound fails startup rather
    /// than a download.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ChanvaultError> {
        let defaults = compile_rule_set(&config.defaults(), "filter")?;
        let mut per_channel = HashMap::new();
        for (channel, rules) in &config.channels {
            let compiled = compile_rule_set(rules, &format!("filter.channels.{channel}"))?;
            per_channel.insert(channel.clone(), compiled);
        }
        Ok(Self {
            defaults,
            per_channel,
        })
    }

    /// Whether the media should be downloaded.
    ///
    /// A per-channel rule for the media's kind takes precedence over the
    /// default rule; with neither, the media is accepted.
    pub fn accepts(&self, channel_id: &str, media: &MediaItem) -> bool {
        if media.kind == MediaKind::Unrecognized {
            return true;
        }
        let Some(size) = media.size_bytes else {
            // Size unknown: download anyway.
            return true;
        };

        let rule = self
            .per_channel
            .get(channel_id)
            .and_then(|rules| rules.get(&media.kind))
            .or_else(|| self.defaults.get(&media.kind));

        match rule {
            Some(range) => range.contains(size),
            None => true,
        }
    }
}

fn compile_rule_set(
    rules: &SizeRuleSet,
    prefix: &str,
) -> Result<BTreeMap<MediaKind, FilterRange>, ChanvaultError> {
    let mut compiled = BTreeMap::new();
    let kinds = [
        (MediaKind::Photo, &rules.photo),
        (MediaKind::Video, &rules.video),
        (MediaKind::Audio, &rules.audio),
        (MediaKind::File, &rules.file),
    ];
    for (kind, rule) in kinds {
        if let Some(rule) = rule {
            let range = rule
                .to_range()
                .map_err(|e| ChanvaultError::Config(format!("{prefix}.{kind}: {e}")))?;
            compiled.insert(kind, range);
        }
    }
    Ok(compiled)
}
