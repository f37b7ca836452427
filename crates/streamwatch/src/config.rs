//! Watcher configuration.
//!
//! Everything the engine reads is carried on [`WatchConfig`] and handed to the
//! components at construction time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::engine::{DedupPolicy, Identity, IdentityPolicy};
use crate::error::ConfigError;
use crate::holodex::DEFAULT_API_BASE;
use crate::notify::RenderMode;

/// Default forward window for upcoming streams.
pub const DEFAULT_HORIZON_MINUTES: u32 = 60;

/// Default display offset (UTC+8, Asia/Taipei).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 480;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of Holodex queries in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default webhook display name when no channel identity applies.
pub const DEFAULT_IDENTITY_NAME: &str = "Stream Watch";

/// A channel the watcher follows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackedChannel {
    /// Channel ID.
    pub id: String,
    /// Display name override.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Avatar override.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl TrackedChannel {
    /// Track a channel by ID only.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            avatar_url: None,
        }
    }

    /// Set the display name override.
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
}

/// Channel file entries may be bare IDs or objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelEntry {
    Id(String),
    Full(TrackedChannel),
}

/// Ordered set of tracked channels.
#[derive(Debug, Clone, Default)]
pub struct TrackedChannels {
    channels: Vec<TrackedChannel>,
    index: HashMap<String, usize>,
}

impl TrackedChannels {
    /// Build the set, keeping the first occurrence of each ID.
    #[must_use]
    pub fn new(channels: impl IntoIterator<Item = TrackedChannel>) -> Self {
        let mut set = Self::default();
        for channel in channels {
            if set.index.contains_key(&channel.id) {
                continue;
            }
            set.index.insert(channel.id.clone(), set.channels.len());
            set.channels.push(channel);
        }
        set
    }

    /// Track a list of bare channel IDs.
    #[must_use]
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(TrackedChannel::new))
    }

    /// Load the channel list from a JSON file.
    ///
    /// Accepts `["UC..."]`, `[{"id": "UC...", "nickname": "..."}]`, or a mix.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ChannelsUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let entries: Vec<ChannelEntry> =
            serde_json::from_str(&content).map_err(|source| ConfigError::ChannelsInvalid {
                path: path.to_path_buf(),
                source,
            })?;

        let channels = Self::new(entries.into_iter().map(|entry| match entry {
            ChannelEntry::Id(id) => TrackedChannel::new(id),
            ChannelEntry::Full(channel) => channel,
        }));

        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        Ok(channels)
    }

    /// Whether a channel is tracked.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a tracked channel.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedChannel> {
        self.index.get(id).map(|&i| &self.channels[i])
    }

    /// First configured channel.
    #[must_use]
    pub fn first(&self) -> Option<&TrackedChannel> {
        self.channels.first()
    }

    /// Iterate in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedChannel> {
        self.channels.iter()
    }

    /// Number of tracked channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Complete watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Holodex API base URL.
    pub api_base: String,
    /// Holodex API key.
    pub api_key: String,
    /// Webhook URL. Only required when notifications are sent.
    pub webhook_url: Option<String>,
    /// Channels to follow.
    pub tracked: TrackedChannels,
    /// Notified-set state file.
    pub state_path: PathBuf,
    /// Forward window for upcoming streams.
    pub horizon: chrono::Duration,
    /// Offset used when rendering times.
    pub display_offset: FixedOffset,
    /// Per-call timeout for Holodex queries.
    pub request_timeout: Duration,
    /// Holodex queries in flight at once.
    pub concurrency: usize,
    /// Which statuses go through the novelty tracker.
    pub dedup_policy: DedupPolicy,
    /// How the batch identity is chosen.
    pub identity_policy: IdentityPolicy,
    /// Embeds or plain text.
    pub render_mode: RenderMode,
    /// Identity used when no channel identity applies.
    pub default_identity: Identity,
}

impl WatchConfig {
    /// Create a configuration with defaults for everything but the
    /// credentials and channel list.
    pub fn new(api_key: Option<String>, tracked: TrackedChannels) -> Result<Self, ConfigError> {
        let api_key = require(api_key, "HOLODEX_API_KEY")?;
        if tracked.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            webhook_url: None,
            tracked,
            state_path: PathBuf::from("notified.json"),
            horizon: horizon_from_minutes(DEFAULT_HORIZON_MINUTES),
            display_offset: offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            dedup_policy: DedupPolicy::default(),
            identity_policy: IdentityPolicy::default(),
            render_mode: RenderMode::default(),
            default_identity: Identity::new(DEFAULT_IDENTITY_NAME, None),
        })
    }

    /// The webhook URL, which must be present before anything is sent.
    pub fn webhook_url(&self) -> Result<&str, ConfigError> {
        self.webhook_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_WEBHOOK_URL"))
    }
}

/// Treat absent and blank values the same.
pub fn require(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Horizon from a minute count.
#[must_use]
pub fn horizon_from_minutes(minutes: u32) -> chrono::Duration {
    chrono::Duration::minutes(i64::from(minutes))
}

/// Display offset from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::Invalid {
            field: "utc_offset_minutes",
            value: minutes.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_channels(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_mixed_entries() {
        let file = write_channels(
            r#"["UC1", {"id": "UC2", "nickname": "Two", "avatar_url": "https://a/2.png"}, "UC1"]"#,
        );

        let channels = TrackedChannels::load(file.path()).unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels.contains("UC1"));
        assert_eq!(
            channels.get("UC2").and_then(|c| c.nickname.as_deref()),
            Some("Two")
        );
        assert_eq!(channels.first().map(|c| c.id.as_str()), Some("UC1"));
    }

    #[test]
    fn test_load_empty_list_is_error() {
        let file = write_channels("[]");
        assert!(matches!(
            TrackedChannels::load(file.path()),
            Err(ConfigError::NoChannels)
        ));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = TrackedChannels::load(Path::new("/nonexistent/channels.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ChannelsUnreadable { .. }));
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let file = write_channels("{not json");
        assert!(matches!(
            TrackedChannels::load(file.path()),
            Err(ConfigError::ChannelsInvalid { .. })
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let tracked = TrackedChannels::from_ids(["UC1"]);
        assert!(matches!(
            WatchConfig::new(None, tracked.clone()),
            Err(ConfigError::Missing("HOLODEX_API_KEY"))
        ));
        assert!(matches!(
            WatchConfig::new(Some("   ".to_string()), tracked.clone()),
            Err(ConfigError::Missing(_))
        ));

        let config = WatchConfig::new(Some("key".to_string()), tracked).unwrap();
        assert!(matches!(
            config.webhook_url(),
            Err(ConfigError::Missing("DISCORD_WEBHOOK_URL"))
        ));
    }

    #[test]
    fn test_defaults() {
        let config =
            WatchConfig::new(Some("key".to_string()), TrackedChannels::from_ids(["UC1"])).unwrap();
        assert_eq!(config.horizon, chrono::Duration::minutes(60));
        assert_eq!(config.display_offset.local_minus_utc(), 8 * 3600);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.dedup_policy, DedupPolicy::All);
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(offset_from_minutes(-300).is_ok());
        assert!(offset_from_minutes(24 * 60).is_err());
    }
}
