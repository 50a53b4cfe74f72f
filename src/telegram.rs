//! Telegram Bot API delivery.
//!
//! Messages are posted to `sendMessage` as form data with HTML parse mode and
//! link previews disabled. Only HTTP 200 counts as delivered; everything else
//! is logged and reported as `false`.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

/// A destination that accepts formatted messages.
pub trait Channel {
    /// Post one message. Returns whether the platform accepted it.
    async fn deliver(&self, message: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Error body returned by the Bot API.
#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}

/// [`Channel`] that posts to a Telegram chat through the Bot API.
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The endpoint embeds the bot token.
        f.debug_struct("TelegramChannel")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramChannel {
    pub fn new(client: Client, api_url: &str, token: &str, chat_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        }
    }
}

impl Channel for TelegramChannel {
    #[instrument(level = "debug", skip_all, fields(chat_id = %self.chat_id, chars = message.chars().count()))]
    async fn deliver(&self, message: &str) -> bool {
        let t0 = Instant::now();
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = match self.client.post(&self.endpoint).form(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                // reqwest errors can carry the URL, which contains the token.
                error!(error = %e.without_url(), "Telegram request failed");
                return false;
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "Message delivered");
            return true;
        }

        let description = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ApiReply>(&body).ok())
            .and_then(|reply| reply.description)
            .unwrap_or_default();
        warn!(status = status.as_u16(), %description, "Telegram rejected message");
        false
    }
}
