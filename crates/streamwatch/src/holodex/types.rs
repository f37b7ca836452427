//! Holodex stream data types.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Broadcast status as reported by Holodex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Currently broadcasting.
    Live,
    /// Scheduled but not started.
    Upcoming,
    /// Past, missing, or anything else the watcher ignores.
    #[serde(other)]
    Other,
}

impl StreamStatus {
    /// Query-string value for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Upcoming => "upcoming",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel as embedded in a stream record (owner or mention).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Channel ID (YouTube `UC...` identifier).
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Romanized name, when Holodex has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl ChannelRef {
    /// Create a channel reference with an ID and display name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            english_name: None,
            photo: None,
        }
    }

    /// Attach an avatar URL.
    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Best available display name, falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(english) = self.english_name.as_deref().filter(|n| !n.is_empty()) {
            english
        } else {
            &self.id
        }
    }
}

/// One broadcast as returned by the `/live` endpoint.
///
/// A record is a snapshot: the same `id` shows up again on later polls with
/// refreshed fields, possibly with a different status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Video ID, stable for the lifetime of the broadcast.
    pub id: String,
    /// Stream title.
    #[serde(default)]
    pub title: String,
    /// Live, upcoming, or other.
    pub status: StreamStatus,
    /// Owning channel.
    pub channel: ChannelRef,
    /// Scheduled start, absent for some already-live streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_scheduled: Option<DateTime<Utc>>,
    /// Actual start, set once the stream is live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_actual: Option<DateTime<Utc>>,
    /// Channels named as collaborators.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mentions: Vec<ChannelRef>,
}

impl StreamRecord {
    /// Create a record with the minimal required fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        channel: ChannelRef,
        title: impl Into<String>,
        status: StreamStatus,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            channel,
            start_scheduled: None,
            start_actual: None,
            mentions: Vec::new(),
        }
    }

    /// Set the scheduled start time.
    #[must_use]
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_scheduled = Some(at);
        self
    }

    /// Set the mentioned channels.
    #[must_use]
    pub fn with_mentions(mut self, mentions: Vec<ChannelRef>) -> Self {
        self.mentions = mentions;
        self
    }

    /// IDs of every mentioned channel.
    #[must_use]
    pub fn mentioned_channel_ids(&self) -> HashSet<&str> {
        self.mentions.iter().map(|m| m.id.as_str()).collect()
    }

    /// Whether the broadcast is currently live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == StreamStatus::Live
    }

    /// When the stream started or is expected to start.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self.status {
            StreamStatus::Live => self.start_actual.or(self.start_scheduled),
            _ => self.start_scheduled,
        }
    }

    /// Public watch URL.
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Holodex sends `"mentions": null` on some records.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ChannelRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ChannelRef>>::deserialize(deserializer)?.unwrap_or_default())
}
