// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion from wire messages to the crawler's data model.
//!
//! Media classification mirrors what the service exposes: photos are their
//! own media type, everything else is a document whose attributes decide the
//! kind. A document that is neither video nor audio nor a plain named file
//! (stickers, animations) is `Unrecognized` and left to the filter policy,
//! which always accepts it.

use grammers_tl_types as tl;

use chanvault_core::{MediaItem, MediaKind, PendingMessage};

/// Collapse the wire response variants into messages plus mentioned chats.
pub(crate) fn flatten(
    resp: tl::enums::messages::Messages,
) -> (Vec<tl::enums::Message>, Vec<tl::enums::Chat>) {
    use tl::enums::messages::Messages as M;
    match resp {
        M::Messages(m) => (m.messages, m.chats),
        M::Slice(m) => (m.messages, m.chats),
        M::ChannelMessages(m) => (m.messages, m.chats),
        M::NotModified(_) => (Vec::new(), Vec::new()),
    }
}

/// Convert one wire message into a [`PendingMessage`] for `channel_id`.
///
/// Service and deleted messages become media-less entries; their ids still
/// count for cursor advancement.
pub(crate) fn convert(channel_id: &str, message: tl::enums::Message) -> PendingMessage {
    match message {
        tl::enums::Message::Message(m) => {
            let topic_id = topic_of(&m.reply_to);
            let media = m.media.as_ref().and_then(classify);
            let raw = snapshot(channel_id, &m, topic_id, media.as_ref());
            PendingMessage {
                channel_id: channel_id.to_string(),
                topic_id,
                grouped_id: m.grouped_id,
                message_id: m.id as i64,
                is_comment: false,
                comment_channel_id: None,
                media,
                raw: Some(raw),
            }
        }
        tl::enums::Message::Service(m) => PendingMessage {
            channel_id: channel_id.to_string(),
            topic_id: topic_of(&m.reply_to),
            grouped_id: None,
            message_id: m.id as i64,
            is_comment: false,
            comment_channel_id: None,
            media: None,
            raw: None,
        },
        tl::enums::Message::Empty(m) => PendingMessage {
            channel_id: channel_id.to_string(),
            topic_id: None,
            grouped_id: None,
            message_id: m.id as i64,
            is_comment: false,
            comment_channel_id: None,
            media: None,
            raw: None,
        },
    }
}

/// Convert one comment-thread message, keyed to the crawled parent channel.
///
/// The message itself lives in the discussion group; that id is kept so the
/// media bytes can be fetched from where they actually are.
pub(crate) fn convert_reply(
    parent: &PendingMessage,
    message: tl::enums::Message,
) -> PendingMessage {
    let discussion = peer_channel_id(&message);
    let mut pending = convert(&parent.channel_id, message);
    pending.is_comment = true;
    pending.comment_channel_id = discussion;
    // In a thread the reply header points at the thread root, not a forum
    // topic.
    pending.topic_id = None;
    pending
}

fn peer_channel_id(message: &tl::enums::Message) -> Option<String> {
    let peer = match message {
        tl::enums::Message::Message(m) => Some(&m.peer_id),
        tl::enums::Message::Service(m) => Some(&m.peer_id),
        tl::enums::Message::Empty(m) => m.peer_id.as_ref(),
    };
    match peer {
        Some(tl::enums::Peer::Channel(p)) => Some(p.channel_id.to_string()),
        _ => None,
    }
}

fn topic_of(reply_to: &Option<tl::enums::MessageReplyHeader>) -> Option<i64> {
    match reply_to {
        Some(tl::enums::MessageReplyHeader::Header(h)) => h
            .reply_to_top_id
            .or(h.reply_to_msg_id)
            .map(|id| id as i64),
        _ => None,
    }
}

/// Classify a message's media attachment, if it is downloadable at all.
///
/// Webpage previews, polls, geo points and the like yield `None`; they carry
/// no file to collect.
pub(crate) fn classify(media: &tl::enums::MessageMedia) -> Option<MediaItem> {
    match media {
        tl::enums::MessageMedia::Photo(p) => match p.photo {
            Some(tl::enums::Photo::Photo(_)) => Some(MediaItem {
                kind: MediaKind::Photo,
                // The service reports photo sizes per thumbnail level, not
                // for the stored file; left unknown.
                size_bytes: None,
                file_name: None,
                mime_type: None,
            }),
            _ => None,
        },
        tl::enums::MessageMedia::Document(d) => match &d.document {
            Some(tl::enums::Document::Document(doc)) => Some(classify_document(
                &doc.attributes,
                &doc.mime_type,
                doc.size,
            )),
            _ => None,
        },
        _ => None,
    }
}

/// Decide a document's media kind from its attributes.
pub(crate) fn classify_document(
    attributes: &[tl::enums::DocumentAttribute],
    mime_type: &str,
    size: i64,
) -> MediaItem {
    use tl::enums::DocumentAttribute as Attr;

    let file_name = attributes.iter().find_map(|attr| match attr {
        Attr::Filename(f) => Some(f.file_name.clone()),
        _ => None,
    });
    let kind = if attributes.iter().any(|a| matches!(a, Attr::Video(_))) {
        MediaKind::Video
    } else if attributes.iter().any(|a| matches!(a, Attr::Audio(_))) {
        MediaKind::Audio
    } else if attributes.len() == 1 && file_name.is_some() {
        MediaKind::File
    } else {
        MediaKind::Unrecognized
    };

    MediaItem {
        kind,
        size_bytes: Some(size),
        file_name,
        mime_type: (!mime_type.is_empty()).then(|| mime_type.to_string()),
    }
}

/// Compact JSON snapshot of the message, stored in the dedup ledger when the
/// operator enables raw persistence.
fn snapshot(
    channel_id: &str,
    message: &tl::types::Message,
    topic_id: Option<i64>,
    media: Option<&MediaItem>,
) -> String {
    serde_json::json!({
        "channel_id": channel_id,
        "message_id": message.id,
        "date": message.date,
        "text": message.message,
        "topic_id": topic_id,
        "grouped_id": message.grouped_id,
        "media": media.map(|m| serde_json::json!({
            "kind": m.kind.to_string(),
            "size_bytes": m.size_bytes,
            "file_name": m.file_name,
            "mime_type": m.mime_type,
        })),
    })
    .to_string()
}
