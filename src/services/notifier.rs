// src/services/notifier.rs

//! Outbound notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{NotifyConfig, ReleaseRecord};

/// Delivers one message to one channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, text: &str, channel: &str) -> Result<()>;
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramMessenger {
    client: Client,
    endpoint: String,
}

impl TelegramMessenger {
    pub fn new(client: Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
        }
    }

    /// Build from configuration, reading the token from the environment.
    pub fn from_env(client: Client, config: &NotifyConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| AppError::config(format!("{} is not set", config.token_env)))?;
        Ok(Self::new(client, &config.api_url, &token))
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, text: &str, channel: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("chat_id", channel),
                ("text", text),
                ("parse_mode", "Markdown"),
                ("disable_web_page_preview", "yes"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(channel, format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }
}

/// Prints messages instead of sending them.
#[derive(Debug, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, text: &str, channel: &str) -> Result<()> {
        log::info!("[dry-run] {}:\n{}", channel, text);
        Ok(())
    }
}

/// Fans messages out to every configured channel.
pub struct NotificationDispatcher<'a> {
    messenger: &'a dyn Messenger,
    channels: Vec<String>,
    pacing: Duration,
    /// `None` when the window reaches past the representable range
    retention: Option<TimeDelta>,
    sent_any: AtomicBool,
}

impl<'a> NotificationDispatcher<'a> {
    pub fn new(messenger: &'a dyn Messenger, config: &NotifyConfig) -> Self {
        Self {
            messenger,
            channels: config.channels.clone(),
            pacing: Duration::from_millis(config.pacing_ms),
            retention: TimeDelta::try_days(config.retention_days),
            sent_any: AtomicBool::new(false),
        }
    }

    /// Whether `record` is inside the retention window at `now`.
    ///
    /// Records with an unparseable date are treated as recent.
    pub fn is_recent(&self, record: &ReleaseRecord, now: DateTime<Utc>) -> bool {
        let cutoff = self.retention.and_then(|r| now.checked_sub_signed(r));
        match (record.published_at(), cutoff) {
            (Some(published), Some(cutoff)) => published >= cutoff,
            _ => true,
        }
    }

    /// Send `text` for `record` to every channel, pacing after the first
    /// send of this dispatcher. Returns the number of successful sends.
    pub async fn dispatch_at(&self, record: &ReleaseRecord, text: &str, now: DateTime<Utc>) -> usize {
        if !self.is_recent(record, now) {
            log::debug!("Skipping {}: older than retention window", record.tag);
            return 0;
        }

        let mut delivered = 0;
        for channel in &self.channels {
            if self.sent_any.swap(true, Ordering::Relaxed) && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            match self.messenger.send(text, channel).await {
                Ok(()) => delivered += 1,
                Err(e) => log::error!("Failed to notify {} about {}: {}", channel, record.tag, e),
            }
        }
        delivered
    }
}
