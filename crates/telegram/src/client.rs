//! Thin Telegram Bot API client used by the direct transport and the relay
//! server. Only `sendMessage` is needed; the bot token is never logged.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum SendError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api rejected the message: {0}")]
    Api(String),
    #[error("could not build telegram url: {0}")]
    InvalidUrl(String),
}

/// Seam for anything that can deliver rendered message text. The relay
/// server and the tests substitute recording stubs for the real client.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SendError>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(bot_token: SecretString, chat_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token,
            chat_id: chat_id.into(),
        }
    }

    /// Points the client at a different API base. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn send_message_endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token.expose_secret())
    }

    /// Query-string GET form of `sendMessage`, used by the direct-mode
    /// fallback beacon whose response is never read.
    pub fn beacon_url(&self, text: &str) -> Result<Url, SendError> {
        let mut url = Url::parse(&self.send_message_endpoint())
            .map_err(|error| SendError::InvalidUrl(error.to_string()))?;
        url.query_pairs_mut()
            .append_pair("chat_id", &self.chat_id)
            .append_pair("text", text)
            .append_pair("parse_mode", "Markdown");
        Ok(url)
    }

    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let request =
            SendMessageRequest { chat_id: &self.chat_id, text, parse_mode: "Markdown" };
        let response =
            self.http.post(self.send_message_endpoint()).json(&request).send().await?;

        let status = response.status();
        let body: TelegramResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(SendError::Api(format!("telegram returned status {status}")))
            }
            Err(error) => return Err(SendError::Http(error)),
        };

        if body.ok {
            Ok(())
        } else {
            Err(SendError::Api(
                body.description.unwrap_or_else(|| format!("telegram returned status {status}")),
            ))
        }
    }
}
