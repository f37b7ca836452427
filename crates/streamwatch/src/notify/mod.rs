//! Notification delivery.
//!
//! - [`NotificationSink`] is the seam the dispatcher sends batches through
//! - [`DiscordSink`] posts to a Discord-compatible webhook
//! - [`render`] turns a batch into webhook messages

pub mod discord;
pub mod render;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::engine::NotificationBatch;
use crate::error::{ConfigError, SendError};

pub use discord::DiscordSink;

/// Message layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// One rich card per stream.
    #[default]
    Embeds,
    /// One line per stream in the message text.
    Text,
}

impl FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embeds" | "embed" => Ok(Self::Embeds),
            "text" => Ok(Self::Text),
            _ => Err(ConfigError::Invalid {
                field: "render",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Embeds => "embeds",
            Self::Text => "text",
        })
    }
}

/// Destination for notification batches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Name of this sink, for logs.
    fn name(&self) -> &'static str;

    /// Deliver a batch. Succeeds only if every message was accepted; on
    /// failure the error names the streams that did go out.
    async fn send(&self, batch: &NotificationBatch) -> Result<(), SendError>;
}
