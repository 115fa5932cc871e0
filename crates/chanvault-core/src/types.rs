// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared between the crawler core, the storage layer, and the
//! remote client adapter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// The media category carried by a message, resolved once per message.
///
/// `Unrecognized` covers media the adapter could not classify; the filter
/// policy always accepts it (bias toward over-downloading rather than
/// silently dropping content).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    File,
    Unrecognized,
}

impl MediaKind {
    /// The full downloadable set, used as the lazily-initialized default
    /// allow-list for a channel seen for the first time.
    pub fn full_set() -> BTreeSet<MediaKind> {
        [
            MediaKind::Photo,
            MediaKind::Video,
            MediaKind::Audio,
            MediaKind::File,
        ]
        .into_iter()
        .collect()
    }

    /// Fallback file extension when the service supplies neither a filename
    /// nor a usable MIME type.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::File | MediaKind::Unrecognized => "dat",
        }
    }
}

/// A forum topic within a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub id: i64,
    pub title: String,
}

/// One enumerated channel, an immutable snapshot for a single crawl tick.
///
/// `topics` is empty for non-forum channels and for forum channels whose
/// topic list could not be resolved this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub is_forum: bool,
    pub topics: Vec<TopicInfo>,
}

/// The media payload attached to a message, as reported by the service.
///
/// `size_bytes` is `None` when the service does not report a size for this
/// media kind; the filter policy treats unknown sizes as "download anyway".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub size_bytes: Option<i64>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// A fetched message awaiting download, exclusively owned by its channel's
/// pending queue until a worker finishes an attempt on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub channel_id: String,
    /// Forum topic the message belongs to, if any.
    pub topic_id: Option<i64>,
    /// Album/group identifier shared by messages posted together.
    pub grouped_id: Option<i64>,
    pub message_id: i64,
    /// True when sourced from a reply-thread fetch rather than the main
    /// timeline. Comment messages never advance the channel cursor.
    pub is_comment: bool,
    /// The discussion-group channel a comment message actually lives in.
    pub comment_channel_id: Option<String>,
    pub media: Option<MediaItem>,
    /// Raw message snapshot for the dedup ledger, policy-gated.
    pub raw: Option<String>,
}

impl PendingMessage {
    /// Stable content-addressed key identifying this message across restarts.
    ///
    /// Covers the full identity tuple so a comment and a main-timeline
    /// message with the same numeric id never collide.
    pub fn unique_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.channel_id.as_bytes());
        hasher.update([0x1f]);
        if let Some(topic) = self.topic_id {
            hasher.update(topic.to_le_bytes());
        }
        hasher.update([0x1f]);
        if let Some(ref comment_channel) = self.comment_channel_id {
            hasher.update(comment_channel.as_bytes());
        }
        hasher.update([0x1f]);
        hasher.update(self.message_id.to_le_bytes());
        hasher.update([0x1f]);
        if let Some(grouped) = self.grouped_id {
            hasher.update(grouped.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Persisted per-channel crawl position and media-type allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub channel_id: String,
    /// Last fully-handled main-timeline message id; 0 means never crawled.
    pub last_message_id: i64,
    pub media_types: BTreeSet<MediaKind>,
}

impl Cursor {
    /// The zero-value cursor returned for a channel that has never been seen.
    pub fn absent(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            last_message_id: 0,
            media_types: MediaKind::full_set(),
        }
    }
}

/// One row of the dedup ledger, keyed by [`PendingMessage::unique_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    pub unique_key: String,
    pub channel_id: String,
    pub message_id: i64,
    pub file_name: Option<String>,
    pub save_path: Option<String>,
    pub raw_message: Option<String>,
}

/// Inclusive byte bounds for one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRange {
    pub min: i64,
    pub max: i64,
}

impl FilterRange {
    /// Build a range from two bounds in either order; the operator is not
    /// required to pre-sort them.
    pub fn normalized(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, size: i64) -> bool {
        self.min <= size && size <= self.max
    }
}

/// How much history to collect the first time a channel is crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backfill {
    /// Collect the entire history, one page per tick, starting from the
    /// single oldest message.
    Full,
    /// Collect only the newest `n` messages; 0 seeds the cursor without
    /// collecting anything.
    Recent(u32),
}

impl Backfill {
    /// Decode the operator-facing integer form: -1 means full history,
    /// a non-negative value means "newest n".
    pub fn from_config(value: i64) -> Self {
        if value < 0 {
            Backfill::Full
        } else {
            Backfill::Recent(value as u32)
        }
    }
}

/// Result of one resume-aware page fetch, messages oldest-first.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// The newest message id observed, for cursor seeding when `messages`
    /// is empty on a never-crawled channel.
    pub new_last_id: i64,
    pub messages: Vec<PendingMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(channel: &str, id: i64) -> PendingMessage {
        PendingMessage {
            channel_id: channel.to_string(),
            topic_id: None,
            grouped_id: None,
            message_id: id,
            is_comment: false,
            comment_channel_id: None,
            media: None,
            raw: None,
        }
    }

    #[test]
    fn media_kind_round_trips_through_strings() {
        use std::str::FromStr;
        for kind in [
            MediaKind::Photo,
            MediaKind::Video,
            MediaKind::Audio,
            MediaKind::File,
            MediaKind::Unrecognized,
        ] {
            let parsed = MediaKind::from_str(&kind.to_string()).expect("should parse back");
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn full_set_excludes_unrecognized() {
        let set = MediaKind::full_set();
        assert_eq!(set.len(), 4);
        assert!(!set.contains(&MediaKind::Unrecognized));
    }

    #[test]
    fn unique_key_is_stable() {
        let a = message("chan-1", 42);
        let b = message("chan-1", 42);
        assert_eq!(a.unique_key(), b.unique_key());
    }

    #[test]
    fn unique_key_differs_by_identity_fields() {
        let base = message("chan-1", 42);

        let other_channel = message("chan-2", 42);
        assert_ne!(base.unique_key(), other_channel.unique_key());

        let mut with_topic = message("chan-1", 42);
        with_topic.topic_id = Some(7);
        assert_ne!(base.unique_key(), with_topic.unique_key());

        let mut with_group = message("chan-1", 42);
        with_group.grouped_id = Some(99);
        assert_ne!(base.unique_key(), with_group.unique_key());

        let mut comment = message("chan-1", 42);
        comment.comment_channel_id = Some("discussion-1".to_string());
        assert_ne!(base.unique_key(), comment.unique_key());
    }

    #[test]
    fn filter_range_normalizes_reversed_bounds() {
        let range = FilterRange::normalized(2000, 1000);
        assert_eq!(range.min, 1000);
        assert_eq!(range.max, 2000);
        assert!(range.contains(1500));
        assert!(!range.contains(500));
        assert!(range.contains(1000));
        assert!(range.contains(2000));
    }

    #[test]
    fn backfill_decodes_operator_integers() {
        assert_eq!(Backfill::from_config(-1), Backfill::Full);
        assert_eq!(Backfill::from_config(0), Backfill::Recent(0));
        assert_eq!(Backfill::from_config(25), Backfill::Recent(25));
    }

    #[test]
    fn cursor_absent_is_zero_valued() {
        let cursor = Cursor::absent("chan-1");
        assert_eq!(cursor.last_message_id, 0);
        assert_eq!(cursor.media_types, MediaKind::full_set());
    }
}
