//! Telegram channel — long-polls the Bot API for updates.
//!
//! Maps updates onto engine events: photos and voice notes are downloaded
//! into the media directory under content-addressed names, text becomes
//! text/command events, and `update_id` doubles as the event id for dedup.

use std::path::PathBuf;

use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};

use crate::channels::OutboundMessage;
use crate::error::ChannelError;
use crate::fsm::{EventKind, InboundEvent};
use crate::profile::MediaHandle;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// One update mapped to an engine event, addressed by chat id.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub user_id: String,
    pub event: InboundEvent,
}

pub struct TelegramChannel {
    bot_token: String,
    /// Chat ids allowed to talk to the bot. `"*"` means everyone.
    allowed_users: Vec<String>,
    client: reqwest::Client,
    media_dir: PathBuf,
    offset: i64,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allowed_users: Vec<String>, media_dir: PathBuf) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
            media_dir,
            offset: 0,
        }
    }

    fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == user_id)
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Long-poll for the next batch of updates and map them to events.
    /// Updates that can't be mapped (stickers, edits, download failures)
    /// are skipped with a warning; the offset still advances so the bot
    /// never wedges on one bad update.
    pub async fn next_events(&mut self) -> Result<Vec<ChannelEvent>, ChannelError> {
        let body = serde_json::json!({
            "offset": self.offset,
            "timeout": 30,
            "allowed_updates": ["message"],
        });
        let response = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::FetchFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        let payload: serde_json::Value =
            response.json().await.map_err(|e| ChannelError::FetchFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        let mut events = Vec::new();
        let updates = payload
            .get("result")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        for update in updates {
            let Some(update_id) = update.get("update_id").and_then(|v| v.as_i64()) else {
                continue;
            };
            self.offset = self.offset.max(update_id + 1);
            match self.map_update(&update).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(update_id, error = %e, "Skipping unmappable update");
                }
            }
        }
        Ok(events)
    }

    async fn map_update(
        &self,
        update: &serde_json::Value,
    ) -> Result<Option<ChannelEvent>, ChannelError> {
        let Some(message) = update.get("message") else {
            return Ok(None);
        };
        let Some(chat_id) = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_i64())
        else {
            return Ok(None);
        };
        let user_id = chat_id.to_string();
        if !self.is_allowed(&user_id) {
            tracing::debug!(user_id, "Dropping update from unlisted chat");
            return Ok(None);
        }
        let event_id = update
            .get("update_id")
            .and_then(|v| v.as_i64())
            .unwrap_or_default()
            .to_string();

        // Largest photo size is last in Telegram's array.
        if let Some(file_id) = message
            .get("photo")
            .and_then(|p| p.as_array())
            .and_then(|sizes| sizes.last())
            .and_then(|size| size.get("file_id"))
            .and_then(|v| v.as_str())
        {
            let image = self.download_media(file_id, "jpg").await?;
            return Ok(Some(ChannelEvent {
                user_id,
                event: InboundEvent::new(event_id, EventKind::Photo { image }),
            }));
        }

        if let Some(file_id) = message
            .get("voice")
            .and_then(|v| v.get("file_id"))
            .and_then(|v| v.as_str())
        {
            let audio = self.download_media(file_id, "ogg").await?;
            return Ok(Some(ChannelEvent {
                user_id,
                event: InboundEvent::new(event_id, EventKind::Voice { audio }),
            }));
        }

        if let Some(text) = message.get("text").and_then(|v| v.as_str()) {
            return Ok(Some(ChannelEvent {
                user_id,
                event: InboundEvent::from_text(event_id, text),
            }));
        }

        Ok(None)
    }

    /// Fetch a file from Telegram and store it under its sha256 name.
    async fn download_media(
        &self,
        file_id: &str,
        extension: &str,
    ) -> Result<MediaHandle, ChannelError> {
        let failed = |reason: String| ChannelError::MediaDownloadFailed {
            name: "telegram".into(),
            file_id: file_id.to_string(),
            reason,
        };

        let info: serde_json::Value = self
            .client
            .post(self.api_url("getFile"))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .json()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let file_path = info
            .get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| failed("getFile returned no file_path".to_string()))?;

        let url = format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token
        );
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let digest = Sha256::digest(&bytes);
        let handle = MediaHandle::new(format!("{}.{extension}", hex::encode(digest)));
        let path = self.media_dir.join(handle.as_str());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(handle)
    }

    /// Deliver one outbound message to a chat.
    pub async fn deliver(
        &self,
        user_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        match message {
            OutboundMessage::Text(text) => self.send_text(user_id, text).await,
            OutboundMessage::Photo { image, caption } => {
                self.send_photo(user_id, image, caption.as_deref()).await
            }
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            let response = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;
            if !response.status().is_success() {
                let reason = response.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason,
                });
            }
        }
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        image: &MediaHandle,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let path = self.media_dir.join(image.as_str());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("reading {image}: {e}"),
            })?;
        let part = Part::bytes(bytes).file_name(image.as_str().to_string());
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.api_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason,
            });
        }
        Ok(())
    }
}

/// Split text on line boundaries where possible, hard-splitting only when a
/// single line exceeds the limit.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() > max_len {
            let mut rest = line;
            while rest.len() > max_len {
                let mut split_at = max_len;
                while !rest.is_char_boundary(split_at) {
                    split_at -= 1;
                }
                let (head, tail) = rest.split_at(split_at);
                chunks.push(head.to_string());
                rest = tail;
            }
            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_stay_whole() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
    }

    #[test]
    fn long_messages_split_on_lines() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_message(&text, 12);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a'));
        assert!(chunks[1].starts_with('b'));
    }

    #[test]
    fn oversized_line_hard_splits() {
        let text = "x".repeat(30);
        let chunks = split_message(&text, 12);
        assert!(chunks.iter().all(|c| c.len() <= 12));
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 30);
    }
}
