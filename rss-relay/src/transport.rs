use crate::types::{RelayError, Result, SendConfig, SendOutcome, Transport};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Telegram Bot API client for plain-text messages.
pub struct TelegramTransport {
    client: Client,
    bot_token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramTransport {
    pub fn new(bot_token: impl Into<String>, config: SendConfig) -> Result<Self> {
        let bot_token = bot_token.into().trim().to_string();
        if bot_token.is_empty() {
            return Err(RelayError::Transport("bot token must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            bot_token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Send a text message
    pub async fn send_message(&self, chat_id: &str, text: &str) -> SendOutcome {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await;

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return SendOutcome::TimedOut,
            // The token is part of the URL; keep it out of logs
            Err(e) => return SendOutcome::Failed(e.without_url().to_string()),
        };

        let status = resp.status();
        match resp.json::<ApiResponse>().await {
            Ok(body) if body.ok && status.is_success() => {
                debug!("Telegram accepted message for {}", chat_id);
                SendOutcome::Delivered
            }
            Ok(body) => SendOutcome::Failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.description.unwrap_or_else(|| "no description".to_string())
            )),
            Err(e) if e.is_timeout() => SendOutcome::TimedOut,
            Err(e) => SendOutcome::Failed(format!(
                "HTTP {}: unreadable response: {}",
                status.as_u16(),
                e.without_url()
            )),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, destination_id: &str, text: &str) -> SendOutcome {
        self.send_message(destination_id, text).await
    }
}
