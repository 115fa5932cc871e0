// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic destination paths for downloaded media.
//!
//! The same message always maps to the same path, so a re-download after a
//! crash overwrites its own partial file instead of accumulating copies.

use std::path::{Path, PathBuf};

use chanvault_core::{MediaItem, PendingMessage};

/// Compute the file name and full destination path for a message's media.
///
/// The name stem is built from the message identity:
/// `<channel_id>[_<topic_id>][_<grouped_id>]_<message_id>`. When the service
/// supplied an original file name it is appended (sanitized); otherwise an
/// extension is inferred from the MIME type, falling back to the kind's
/// default. Files land under `<media_dir>/<channel_id>/`.
pub fn destination_path(
    media_dir: &str,
    message: &PendingMessage,
    media: &MediaItem,
) -> (String, PathBuf) {
    let mut stem = sanitize(&message.channel_id);
    if let Some(topic) = message.topic_id {
        stem.push('_');
        stem.push_str(&topic.to_string());
    }
    if let Some(grouped) = message.grouped_id {
        stem.push('_');
        stem.push_str(&grouped.to_string());
    }
    stem.push('_');
    stem.push_str(&message.message_id.to_string());

    let file_name = match media.file_name.as_deref() {
        Some(original) if !original.trim().is_empty() => {
            format!("{stem}_{}", sanitize(original))
        }
        _ => {
            let ext = media
                .mime_type
                .as_deref()
                .and_then(extension_from_mime)
                .unwrap_or_else(|| media.kind.default_extension());
            format!("{stem}.{ext}")
        }
    };

    let path = Path::new(media_dir)
        .join(sanitize(&message.channel_id))
        .join(&file_name);
    (file_name, path)
}

/// Map common MIME types to file extensions.
fn extension_from_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}

/// Replace path separators and control characters so service-supplied names
/// cannot escape the channel directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
