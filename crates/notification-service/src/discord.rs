use async_trait::async_trait;

use crate::{rejected, NotificationChannel, NotificationError};

/// Discord webhook notifier, used as a mirror of the Telegram chat.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            webhook_url: webhook_url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        // Embed descriptions share Telegram's 4096 character limit
        let payload = serde_json::json!({
            "embeds": [{
                "description": text,
                "color": 0x0099ff,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Transport {
                channel: "discord-webhook".into(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected("discord-webhook", status, body));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
