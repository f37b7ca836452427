//! Discord webhook notification sink.

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use tracing::{debug, warn};

use super::render::{render_messages, WebhookMessage};
use super::{NotificationSink, RenderMode};
use crate::engine::NotificationBatch;
use crate::error::{SendError, SinkError};

/// Posts batches to a Discord-compatible webhook.
pub struct DiscordSink {
    webhook_url: String,
    render_mode: RenderMode,
    display_offset: FixedOffset,
    client: reqwest::Client,
}

impl DiscordSink {
    /// Create a sink for a webhook URL.
    pub fn new(
        webhook_url: impl Into<String>,
        render_mode: RenderMode,
        display_offset: FixedOffset,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            render_mode,
            display_offset,
            client,
        })
    }

    /// Messages this sink would post for a batch.
    #[must_use]
    pub fn render(&self, batch: &NotificationBatch) -> Vec<WebhookMessage> {
        render_messages(batch, self.render_mode, self.display_offset)
    }

    async fn post(&self, message: &WebhookMessage) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .map_or(5, |secs| secs.ceil() as u64);

            warn!(
                sink = "discord",
                retry_after_secs = retry_after,
                "Rate limited by Discord"
            );

            Err(SinkError::RateLimited {
                retry_after_secs: retry_after,
            })
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                sink = "discord",
                status = %status,
                body = %body,
                "Discord webhook request failed"
            );

            Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, batch: &NotificationBatch) -> Result<(), SendError> {
        let messages = self.render(batch);
        let total = messages.len();
        let mut delivered: Vec<String> = Vec::with_capacity(batch.len());

        for (i, message) in messages.iter().enumerate() {
            debug!(
                sink = "discord",
                part = i + 1,
                total,
                username = %message.username,
                "Sending notification"
            );
            if let Err(source) = self.post(message).await {
                if !delivered.is_empty() {
                    warn!(
                        sink = "discord",
                        delivered = delivered.len(),
                        undelivered = batch.len() - delivered.len(),
                        "Batch only partially delivered"
                    );
                }
                return Err(SendError { delivered, source });
            }
            delivered.extend(message.stream_ids.iter().cloned());
        }

        debug!(sink = "discord", items = batch.len(), "Notification sent successfully");
        Ok(())
    }
}
