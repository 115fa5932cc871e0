// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram implementation of the chanvault collaborator seam.
//!
//! Implements [`ChannelClient`] over grammers (MTProto), providing channel
//! enumeration, positional history pages, comment-thread fetches, and media
//! byte streaming. Login is interactive on first run; the session is
//! persisted at `account.session_path` and reused afterwards.

pub mod media;
pub mod resolve;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use grammers_client::types::Downloadable;
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::{PackedChat, Session};
use grammers_tl_types as tl;
use tracing::{debug, info};

use chanvault_config::model::AccountConfig;
use chanvault_core::{ChannelClient, ChannelInfo, ChanvaultError, PendingMessage, ProgressSink};

/// Comment threads are collected one page at a time.
const REPLY_PAGE_LIMIT: i32 = 100;

/// One logged-in Telegram account.
///
/// Keeps a cache of packed peers harvested from every server response, so
/// later history and download calls can address channels without a fresh
/// resolution round-trip.
pub struct TelegramClient {
    client: Client,
    peers: Mutex<HashMap<String, PackedChat>>,
}

impl TelegramClient {
    /// Connect and ensure the account is authorized.
    ///
    /// First run prompts for the login code (and the 2FA password when the
    /// account has one) on the terminal, then saves the session file so
    /// subsequent runs go straight through.
    pub async fn connect(account: &AccountConfig) -> Result<Self, ChanvaultError> {
        let api_hash = account.api_hash.clone().unwrap_or_default();
        let phone = account.phone.clone().unwrap_or_default();

        if let Some(parent) = Path::new(&account.session_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChanvaultError::client("session directory unavailable", e))?;
        }
        let session = Session::load_file_or_create(&account.session_path)
            .map_err(|e| ChanvaultError::client("session load failed", e))?;

        let client = Client::connect(Config {
            session,
            api_id: account.api_id,
            api_hash,
            params: InitParams::default(),
        })
        .await
        .map_err(|e| ChanvaultError::client("connect failed", e))?;

        if !client
            .is_authorized()
            .await
            .map_err(|e| ChanvaultError::client("authorization check failed", e))?
        {
            info!(phone = %phone, "no saved session, starting interactive login");
            let token = client
                .request_login_code(&phone)
                .await
                .map_err(|e| ChanvaultError::client("login code request failed", e))?;
            let code = prompt("Enter the login code: ").await?;
            match client.sign_in(&token, code.trim()).await {
                Ok(_) => {}
                Err(SignInError::PasswordRequired(password_token)) => {
                    let message = match password_token.hint() {
                        Some(hint) => format!("Enter the 2FA password (hint: {hint}): "),
                        None => "Enter the 2FA password: ".to_string(),
                    };
                    let password = prompt(&message).await?;
                    client
                        .check_password(password_token, password.trim())
                        .await
                        .map_err(|e| ChanvaultError::client("password check failed", e))?;
                }
                Err(e) => return Err(ChanvaultError::client("sign-in failed", e)),
            }
        }
        client
            .session()
            .save_to_file(&account.session_path)
            .map_err(|e| ChanvaultError::client("session save failed", e))?;

        let me = client
            .get_me()
            .await
            .map_err(|e| ChanvaultError::client("self lookup failed", e))?;
        info!(user_id = me.id(), "connected to Telegram");

        let mut peers = HashMap::new();
        peers.insert(resolve::SAVED_MESSAGES_ID.to_string(), me.pack());
        Ok(Self {
            client,
            peers: Mutex::new(peers),
        })
    }

    fn packed(&self, channel_id: &str) -> Result<PackedChat, ChanvaultError> {
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers
            .get(channel_id)
            .copied()
            .ok_or_else(|| ChanvaultError::Client {
                message: format!("channel {channel_id} has not been enumerated yet"),
                source: None,
            })
    }

    /// Remember the access hash of every channel mentioned in a response.
    fn harvest(&self, chats: &[tl::enums::Chat]) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        for chat in chats {
            if let tl::enums::Chat::Channel(c) = chat {
                peers.insert(c.id.to_string(), resolve::pack(c));
            }
        }
    }
}

#[async_trait]
impl ChannelClient for TelegramClient {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChanvaultError> {
        resolve::enumerate(&self.client, &self.peers).await
    }

    async fn history_page(
        &self,
        channel_id: &str,
        offset_id: i64,
        add_offset: i64,
        limit: usize,
    ) -> Result<Vec<PendingMessage>, ChanvaultError> {
        let peer = self.packed(channel_id)?.to_input_peer();
        let resp = self
            .client
            .invoke(&tl::functions::messages::GetHistory {
                peer,
                offset_id: offset_id as i32,
                offset_date: 0,
                add_offset: add_offset as i32,
                limit: limit as i32,
                max_id: 0,
                min_id: 0,
                hash: 0,
            })
            .await
            .map_err(|e| {
                ChanvaultError::client(format!("history fetch failed for {channel_id}"), e)
            })?;

        let (messages, chats) = media::flatten(resp);
        self.harvest(&chats);
        debug!(channel = channel_id, count = messages.len(), "history page");
        Ok(messages
            .into_iter()
            .map(|m| media::convert(channel_id, m))
            .collect())
    }

    /// Fetches the comment thread of one main-channel message, oldest-first.
    ///
    /// One page per call; a thread longer than the page limit yields its
    /// newest comments only.
    async fn fetch_replies(
        &self,
        message: &PendingMessage,
    ) -> Result<Vec<PendingMessage>, ChanvaultError> {
        let peer = self.packed(&message.channel_id)?.to_input_peer();
        let resp = self
            .client
            .invoke(&tl::functions::messages::GetReplies {
                peer,
                msg_id: message.message_id as i32,
                offset_id: 0,
                offset_date: 0,
                add_offset: 0,
                limit: REPLY_PAGE_LIMIT,
                max_id: 0,
                min_id: 0,
                hash: 0,
            })
            .await
            .map_err(|e| {
                ChanvaultError::client(
                    format!(
                        "reply fetch failed for {} #{}",
                        message.channel_id, message.message_id
                    ),
                    e,
                )
            })?;

        let (raw_messages, chats) = media::flatten(resp);
        self.harvest(&chats);
        let mut replies: Vec<PendingMessage> = raw_messages
            .into_iter()
            .map(|m| media::convert_reply(message, m))
            .collect();
        replies.reverse();
        Ok(replies)
    }

    async fn download(
        &self,
        message: &PendingMessage,
        sink: ProgressSink,
    ) -> Result<Vec<u8>, ChanvaultError> {
        // Comments live in the discussion group, not the crawled channel.
        let source = message
            .comment_channel_id
            .as_deref()
            .unwrap_or(&message.channel_id);
        let chat = self.packed(source)?;

        // The queued snapshot may hold a stale file reference; refetch the
        // message so the download starts from a fresh one.
        let fetched = self
            .client
            .get_messages_by_id(chat, &[message.message_id as i32])
            .await
            .map_err(|e| {
                ChanvaultError::download(
                    format!("media refetch failed for {source} #{}", message.message_id),
                    e,
                )
            })?;
        let Some(Some(full)) = fetched.into_iter().next() else {
            return Err(ChanvaultError::Download {
                message: format!(
                    "message {source} #{} no longer exists",
                    message.message_id
                ),
                source: None,
            });
        };
        let Some(item) = full.media() else {
            return Err(ChanvaultError::Download {
                message: format!(
                    "message {source} #{} has no downloadable media",
                    message.message_id
                ),
                source: None,
            });
        };

        let total = message
            .media
            .as_ref()
            .and_then(|m| m.size_bytes)
            .unwrap_or(0);
        let mut bytes = Vec::new();
        let mut stream = self.client.iter_download(&Downloadable::Media(item));
        loop {
            match stream.next().await {
                Ok(Some(chunk)) => {
                    bytes.extend_from_slice(&chunk);
                    sink(bytes.len() as i64, total);
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(ChanvaultError::download("media stream interrupted", e));
                }
            }
        }
        debug!(
            channel = source,
            message = message.message_id,
            size = bytes.len(),
            "media downloaded"
        );
        Ok(bytes)
    }
}

async fn prompt(message: &str) -> Result<String, ChanvaultError> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(message.as_bytes())
        .await
        .map_err(|e| ChanvaultError::client("terminal write failed", e))?;
    stdout
        .flush()
        .await
        .map_err(|e| ChanvaultError::client("terminal write failed", e))?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| ChanvaultError::client("terminal read failed", e))?;
    Ok(line)
}
