// src/notify/telegram.rs
// Delivery boundary. One attempt per send: a failed send is logged and the
// batch moves on; there are no retries anywhere in the pipeline. Fixed
// delays between chats and between chunks respect the provider rate limits.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Captions on photo messages are capped well below text messages.
const CAPTION_LIMIT: usize = 1000;

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SendPhotoPayload<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramNotifier {
    token: String,
    chat_ids: Vec<String>,
    client: Client,
    base_url: String,
    text_timeout: Duration,
    photo_timeout: Duration,
    chat_delay: Duration,
    chunk_delay: Duration,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_ids: Vec<String>) -> Self {
        Self {
            token: token.into(),
            chat_ids,
            client: Client::new(),
            base_url: "https://api.telegram.org".to_string(),
            text_timeout: Duration::from_secs(10),
            photo_timeout: Duration::from_secs(30),
            chat_delay: Duration::from_secs(5),
            chunk_delay: Duration::from_secs(2),
        }
    }

    /// Point at a different API host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Shrink the fixed delays (tests).
    pub fn with_delays(mut self, chat_delay: Duration, chunk_delay: Duration) -> Self {
        self.chat_delay = chat_delay;
        self.chunk_delay = chunk_delay;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let payload = SendMessagePayload {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(self.text_timeout)
            .json(&payload)
            .send()
            .await
            .context("sendMessage request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("sendMessage HTTP {status}: {body}"));
        }
        Ok(())
    }

    async fn send_photo(&self, chat_id: &str, photo: &str, caption: &str) -> Result<()> {
        let payload = SendPhotoPayload {
            chat_id,
            photo,
            caption,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };
        let resp = self
            .client
            .post(self.api_url("sendPhoto"))
            .timeout(self.photo_timeout)
            .json(&payload)
            .send()
            .await
            .context("sendPhoto request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("sendPhoto HTTP {status}: {body}"));
        }
        Ok(())
    }

    /// Deliver one chat's worth of chunks. When a header image is configured
    /// and the whole digest fits a photo caption, it goes out as a single
    /// photo message; a failed photo send falls back to plain text.
    async fn deliver_to_chat(
        &self,
        chat_id: &str,
        chunks: &[String],
        header_image: Option<&str>,
    ) -> Result<()> {
        if let (Some(photo), [only]) = (header_image, chunks) {
            if only.chars().count() <= CAPTION_LIMIT {
                match self.send_photo(chat_id, photo, only).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(chat_id, error = ?e, "photo send failed, falling back to text");
                    }
                }
            }
        }

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.chunk_delay).await;
            }
            self.send_message(chat_id, chunk).await?;
            tracing::info!(chat_id, chunk = i + 1, total = chunks.len(), "chunk delivered");
        }
        Ok(())
    }

    /// Fan a digest out to every configured chat. Returns the number of
    /// chats delivered successfully; failures are logged, never raised.
    pub async fn broadcast(&self, chunks: &[String], header_image: Option<&str>) -> usize {
        if chunks.is_empty() {
            return 0;
        }
        let mut delivered = 0;
        for (i, chat_id) in self.chat_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.chat_delay).await;
            }
            match self.deliver_to_chat(chat_id, chunks, header_image).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(chat_id, error = ?e, "delivery failed");
                }
            }
        }
        tracing::info!(delivered, chats = self.chat_ids.len(), "broadcast finished");
        delivered
    }
}
