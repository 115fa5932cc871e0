// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel enumeration.
//!
//! Lists the account's dialogs, resolves channel metadata in bulk, and
//! attaches forum topics best-effort. The operator's saved-messages
//! pseudo-channel is always first in the result.

use std::collections::HashMap;
use std::sync::Mutex;

use grammers_client::Client;
use grammers_session::{PackedChat, PackedType};
use grammers_tl_types as tl;
use tracing::{debug, warn};

use chanvault_core::{ChannelInfo, ChanvaultError, TopicInfo};

/// Id of the saved-messages pseudo-channel prepended to every enumeration.
pub const SAVED_MESSAGES_ID: &str = "me";

const DIALOG_PAGE_LIMIT: i32 = 500;
const TOPIC_PAGE_LIMIT: i32 = 100;

/// Enumerate every channel reachable by the account, in dialog order.
///
/// Packed peers for every channel seen are stored into `peers` so the rest
/// of the client can address them later.
pub(crate) async fn enumerate(
    client: &Client,
    peers: &Mutex<HashMap<String, PackedChat>>,
) -> Result<Vec<ChannelInfo>, ChanvaultError> {
    let resp = client
        .invoke(&tl::functions::messages::GetDialogs {
            exclude_pinned: false,
            folder_id: None,
            offset_date: 0,
            offset_id: 0,
            offset_peer: tl::types::InputPeerEmpty {}.into(),
            limit: DIALOG_PAGE_LIMIT,
            hash: 0,
        })
        .await
        .map_err(|e| ChanvaultError::client("dialog enumeration failed", e))?;

    let (dialogs, chats) = match resp {
        tl::enums::messages::Dialogs::Dialogs(d) => (d.dialogs, d.chats),
        tl::enums::messages::Dialogs::Slice(d) => (d.dialogs, d.chats),
        tl::enums::messages::Dialogs::NotModified(_) => (Vec::new(), Vec::new()),
    };

    // Access hashes come from the dialog listing itself.
    {
        let mut peers = peers.lock().unwrap_or_else(|e| e.into_inner());
        for chat in &chats {
            if let tl::enums::Chat::Channel(c) = chat {
                peers.insert(c.id.to_string(), pack(c));
            }
        }
    }

    let order: Vec<i64> = dialogs
        .iter()
        .filter_map(|dialog| match dialog {
            tl::enums::Dialog::Dialog(d) => match d.peer {
                tl::enums::Peer::Channel(ref p) => Some(p.channel_id),
                _ => None,
            },
            tl::enums::Dialog::Folder(_) => None,
        })
        .collect();

    let inputs: Vec<tl::enums::InputChannel> = {
        let peers = peers.lock().unwrap_or_else(|e| e.into_inner());
        order
            .iter()
            .filter_map(|id| {
                let packed = peers.get(&id.to_string())?;
                Some(
                    tl::types::InputChannel {
                        channel_id: *id,
                        access_hash: packed.access_hash.unwrap_or(0),
                    }
                    .into(),
                )
            })
            .collect()
    };

    let resolved = resolve_channels(client, inputs).await;
    {
        let mut peers = peers.lock().unwrap_or_else(|e| e.into_inner());
        for c in &resolved {
            peers.insert(c.id.to_string(), pack(c));
        }
    }
    let by_id: HashMap<i64, tl::types::Channel> =
        resolved.into_iter().map(|c| (c.id, c)).collect();

    let mut infos = vec![ChannelInfo {
        id: SAVED_MESSAGES_ID.to_string(),
        title: "Saved Messages".to_string(),
        is_forum: false,
        topics: Vec::new(),
    }];
    for id in order {
        let Some(channel) = by_id.get(&id) else {
            continue;
        };
        let topics = if channel.forum {
            let input = tl::types::InputChannel {
                channel_id: channel.id,
                access_hash: channel.access_hash.unwrap_or(0),
            }
            .into();
            // Best-effort: a channel whose topics cannot be listed still
            // appears in the result, just without them.
            match forum_topics(client, input).await {
                Ok(topics) => topics,
                Err(e) => {
                    debug!(channel = id, error = %e, "forum topic fetch failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        infos.push(ChannelInfo {
            id: id.to_string(),
            title: channel.title.clone(),
            is_forum: channel.forum,
            topics,
        });
    }
    debug!(channels = infos.len(), "enumeration complete");
    Ok(infos)
}

/// Resolve channel metadata in bulk, halving the batch on failure.
///
/// A failing batch of more than one channel is split and both halves are
/// retried; a failing batch of one is dropped with a warning, so a single
/// bad peer cannot hide the rest.
async fn resolve_channels(
    client: &Client,
    ids: Vec<tl::enums::InputChannel>,
) -> Vec<tl::types::Channel> {
    let mut resolved = Vec::new();
    let mut stack = vec![ids];
    while let Some(batch) = stack.pop() {
        if batch.is_empty() {
            continue;
        }
        match client
            .invoke(&tl::functions::channels::GetChannels { id: batch.clone() })
            .await
        {
            Ok(resp) => {
                let chats = match resp {
                    tl::enums::messages::Chats::Chats(c) => c.chats,
                    tl::enums::messages::Chats::Slice(c) => c.chats,
                };
                for chat in chats {
                    if let tl::enums::Chat::Channel(c) = chat {
                        resolved.push(c);
                    }
                }
            }
            Err(e) if batch.len() > 1 => {
                debug!(batch = batch.len(), error = %e, "channel batch failed, halving");
                let (left, right) = split_batch(batch);
                stack.push(right);
                stack.push(left);
            }
            Err(e) => {
                warn!(error = %e, "channel metadata unresolvable, dropping");
            }
        }
    }
    resolved
}

async fn forum_topics(
    client: &Client,
    channel: tl::enums::InputChannel,
) -> Result<Vec<TopicInfo>, ChanvaultError> {
    let resp = client
        .invoke(&tl::functions::channels::GetForumTopics {
            channel,
            q: None,
            offset_date: 0,
            offset_id: 0,
            offset_topic: 0,
            limit: TOPIC_PAGE_LIMIT,
        })
        .await
        .map_err(|e| ChanvaultError::client("forum topic listing failed", e))?;

    let tl::enums::messages::ForumTopics::Topics(topics) = resp;
    Ok(topics
        .topics
        .into_iter()
        .filter_map(|topic| match topic {
            tl::enums::ForumTopic::Topic(t) => Some(TopicInfo {
                id: t.id as i64,
                title: t.title,
            }),
            _ => None,
        })
        .collect())
}

/// Pack a channel for later addressing without another resolution.
pub(crate) fn pack(channel: &tl::types::Channel) -> PackedChat {
    PackedChat {
        ty: packed_type(channel.megagroup, channel.gigagroup),
        id: channel.id,
        access_hash: channel.access_hash,
    }
}

fn packed_type(megagroup: bool, gigagroup: bool) -> PackedType {
    if megagroup {
        PackedType::Megagroup
    } else if gigagroup {
        PackedType::Gigagroup
    } else {
        PackedType::Broadcast
    }
}

/// Split a batch roughly in half for the halving retry.
fn split_batch<T>(mut batch: Vec<T>) -> (Vec<T>, Vec<T>) {
    let right = batch.split_off(batch.len() / 2);
    (batch, right)
}
