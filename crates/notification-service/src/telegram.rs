use async_trait::async_trait;
use serde::Deserialize;

use crate::{rejected, NotificationChannel, NotificationError};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends plain-text messages to one chat through the Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            api_base: TELEGRAM_API.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn payload(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        // without_url keeps the bot token out of error messages
        let response = self
            .client
            .post(&url)
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| NotificationError::Transport {
                channel: "telegram".into(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(rejected("telegram", status, body));
        }

        match serde_json::from_str::<ApiReply>(&body) {
            Ok(reply) if !reply.ok => Err(NotificationError::Rejected {
                channel: "telegram".into(),
                status: status.as_u16(),
                body: reply.description.unwrap_or(body),
            }),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
