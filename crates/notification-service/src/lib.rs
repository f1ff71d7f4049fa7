mod chunking;
mod discord;
mod telegram;

pub use chunking::{split_message, TELEGRAM_MESSAGE_LIMIT};
pub use discord::DiscordWebhookNotifier;
pub use telegram::TelegramNotifier;

use std::time::Duration;

use analysis_core::{RetryPolicy, Retryable};
use async_trait::async_trait;

/// Trait for notification channels. Each call delivers one message of at
/// most [`TELEGRAM_MESSAGE_LIMIT`] characters.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("{channel} transport error: {message}")]
    Transport { channel: String, message: String },
    #[error("{channel} rejected message (HTTP {status}): {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Retryable for NotificationError {
    fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Transport { .. } | NotificationError::Timeout(_) => true,
            NotificationError::Rejected { status, .. } => *status == 429 || *status >= 500,
            NotificationError::Config(_) => false,
        }
    }

    fn timed_out(what: &str, after: Duration) -> Self {
        NotificationError::Timeout(format!("{} after {}ms", what, after.as_millis()))
    }
}

/// Configuration for the notification service.
#[derive(Clone)]
pub struct NotificationConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub discord_webhook_url: Option<String>,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("discord_webhook_url", &self.discord_webhook_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Delivers reports to the chat. The Telegram chat is the primary channel
/// and its failures fail the send; mirror channels are best-effort.
pub struct NotificationService {
    primary: Box<dyn NotificationChannel>,
    mirrors: Vec<Box<dyn NotificationChannel>>,
    retry: RetryPolicy,
    chunk_limit: usize,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig, retry: RetryPolicy) -> Self {
        let primary = Box::new(TelegramNotifier::new(&config.bot_token, &config.chat_id));
        let mut service = Self::with_channel(primary, retry);

        if let Some(ref webhook_url) = config.discord_webhook_url {
            service = service.with_mirror(Box::new(DiscordWebhookNotifier::new(webhook_url)));
            tracing::info!("Discord webhook mirror enabled");
        }
        service
    }

    pub fn with_channel(primary: Box<dyn NotificationChannel>, retry: RetryPolicy) -> Self {
        Self {
            primary,
            mirrors: Vec::new(),
            retry,
            chunk_limit: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    pub fn with_mirror(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.mirrors.push(channel);
        self
    }

    pub fn with_chunk_limit(mut self, chunk_limit: usize) -> Self {
        self.chunk_limit = chunk_limit.max(1);
        self
    }

    /// Send a report, split into chunks on line boundaries. Succeeds only if
    /// every chunk reached the primary channel. Blank reports are skipped.
    pub async fn send_report(&self, text: &str) -> Result<(), NotificationError> {
        if text.trim().is_empty() {
            tracing::debug!("Skipping empty report");
            return Ok(());
        }

        let chunks = split_message(text, self.chunk_limit);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            let what = format!("{} chunk {}/{}", self.primary.name(), i + 1, total);
            self.retry
                .run(&what, || self.primary.send(chunk))
                .await?;

            for mirror in &self.mirrors {
                let what = format!("{} chunk {}/{}", mirror.name(), i + 1, total);
                if let Err(e) = self.retry.run(&what, || mirror.send(chunk)).await {
                    tracing::warn!("Failed to mirror report via {}: {}", mirror.name(), e);
                }
            }
        }
        tracing::debug!("Sent report in {} chunk(s)", total);
        Ok(())
    }
}

/// Map a non-success HTTP reply to a notification error.
pub(crate) fn rejected(channel: &str, status: reqwest::StatusCode, body: String) -> NotificationError {
    NotificationError::Rejected {
        channel: channel.to_string(),
        status: status.as_u16(),
        body,
    }
}
