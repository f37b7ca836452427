//! Notification batch assembly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use super::membership::{classify, Membership};
use super::mentions::{MentionAggregator, MentionGroup};
use super::novelty::NoveltyTracker;
use super::window::TimeWindow;
use crate::config::TrackedChannels;
use crate::error::ConfigError;
use crate::holodex::{ChannelRef, StreamRecord, StreamStatus};

/// Display name and avatar used for an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Webhook username.
    pub name: String,
    /// Webhook avatar.
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url,
        }
    }
}

/// How the batch's representative identity is picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Latest direct-live channel, then the first attributed channel of the
    /// latest mentioned-live item, then the default.
    #[default]
    LatestDirectLive,
    /// Channel behind the last item in the batch, whatever its kind.
    LatestAny,
    /// First configured tracked channel.
    FirstTracked,
}

impl FromStr for IdentityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest-direct-live" => Ok(Self::LatestDirectLive),
            "latest-any" => Ok(Self::LatestAny),
            "first-tracked" => Ok(Self::FirstTracked),
            _ => Err(ConfigError::Invalid {
                field: "identity",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LatestDirectLive => "latest-direct-live",
            Self::LatestAny => "latest-any",
            Self::FirstTracked => "first-tracked",
        })
    }
}

/// Whether an item reached the batch directly or through a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Owned by a tracked channel.
    Direct,
    /// Mentions a tracked channel.
    Mentioned,
}

/// One renderable stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Direct or mentioned.
    pub kind: ItemKind,
    /// The stream.
    pub record: StreamRecord,
    /// Attributed tracked channel IDs (mentioned items only).
    pub attributed_ids: Vec<String>,
    /// Display names of the attributed tracked channels.
    pub attributed_names: Vec<String>,
}

impl BatchItem {
    /// An item owned by a tracked channel.
    #[must_use]
    pub fn direct(record: StreamRecord) -> Self {
        Self {
            kind: ItemKind::Direct,
            record,
            attributed_ids: Vec::new(),
            attributed_names: Vec::new(),
        }
    }

    /// The tracked channel that stands behind this item.
    #[must_use]
    pub fn identity_channel(&self) -> Option<&str> {
        match self.kind {
            ItemKind::Direct => Some(&self.record.channel.id),
            ItemKind::Mentioned => self.attributed_ids.first().map(String::as_str),
        }
    }

    /// Whether the stream is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.record.is_live()
    }
}

/// A notification ready to send: ordered items plus one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationBatch {
    /// Items in render order.
    pub items: Vec<BatchItem>,
    /// Identity for the whole message.
    pub identity: Identity,
}

impl NotificationBatch {
    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stream IDs in the batch.
    pub fn stream_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.record.id.as_str())
    }
}

/// Raw inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct BatchInputs {
    /// Result of the unfiltered `live` query.
    pub direct_live: Vec<StreamRecord>,
    /// Result of the unfiltered `upcoming` query.
    pub direct_upcoming: Vec<StreamRecord>,
    /// Aggregated `live` mention queries.
    pub mentioned_live: Vec<MentionGroup>,
    /// Aggregated `upcoming` mention queries.
    pub mentioned_upcoming: Vec<MentionGroup>,
}

/// The four qualifying lists, before novelty filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qualified {
    /// Tracked channels that are live.
    pub direct_live: Vec<StreamRecord>,
    /// Tracked channels starting within the window.
    pub direct_upcoming: Vec<StreamRecord>,
    /// Live collaborations mentioning tracked channels.
    pub mentioned_live: Vec<MentionGroup>,
    /// Collaborations mentioning tracked channels starting within the window.
    pub mentioned_upcoming: Vec<MentionGroup>,
}

impl Qualified {
    /// Total number of qualifying records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.direct_live.len()
            + self.direct_upcoming.len()
            + self.mentioned_live.len()
            + self.mentioned_upcoming.len()
    }

    /// Whether nothing qualified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Channel names and avatars seen during a run, keyed by channel ID.
type Directory = HashMap<String, ChannelRef>;

/// Builds a [`NotificationBatch`] from one run's inputs.
pub struct BatchBuilder<'a> {
    tracked: &'a TrackedChannels,
    window: TimeWindow,
    identity_policy: IdentityPolicy,
    default_identity: &'a Identity,
}

impl<'a> BatchBuilder<'a> {
    /// Create a builder for one run.
    #[must_use]
    pub fn new(
        tracked: &'a TrackedChannels,
        window: TimeWindow,
        identity_policy: IdentityPolicy,
        default_identity: &'a Identity,
    ) -> Self {
        Self {
            tracked,
            window,
            identity_policy,
            default_identity,
        }
    }

    /// Partition inputs into the four qualifying lists.
    ///
    /// Records and mention groups are routed by their own status rather than
    /// by the query that returned them. Mentioned records that turn up in the unfiltered lists
    /// are merged into the mention groups. A stream that qualifies as live is
    /// not repeated as upcoming.
    #[must_use]
    pub fn qualify(&self, inputs: BatchInputs) -> Qualified {
        let mut direct_live = Distinct::default();
        let mut direct_upcoming = Distinct::default();
        let mut live_mentions = MentionAggregator::new();
        let mut upcoming_mentions = MentionAggregator::new();

        for group in inputs
            .mentioned_live
            .into_iter()
            .chain(inputs.mentioned_upcoming)
            .filter(|g| self.is_mention_group(g))
        {
            match group.record.status {
                StreamStatus::Live => live_mentions.absorb_group(group),
                StreamStatus::Upcoming => upcoming_mentions.absorb_group(group),
                StreamStatus::Other => {
                    debug!(
                        stream_id = %group.record.id,
                        "Skipping mention with no live or upcoming status"
                    );
                }
            }
        }

        for record in inputs.direct_live.into_iter().chain(inputs.direct_upcoming) {
            match classify(&record, self.tracked) {
                Membership::Direct => match record.status {
                    StreamStatus::Live => direct_live.push(record),
                    StreamStatus::Upcoming => direct_upcoming.push(record),
                    StreamStatus::Other => {
                        debug!(
                            stream_id = %record.id,
                            "Skipping stream with no live or upcoming status"
                        );
                    }
                },
                Membership::Mentioned => match record.status {
                    StreamStatus::Live => live_mentions.absorb_record(record, self.tracked),
                    StreamStatus::Upcoming => {
                        upcoming_mentions.absorb_record(record, self.tracked);
                    }
                    StreamStatus::Other => {
                        debug!(
                            stream_id = %record.id,
                            "Skipping mention with no live or upcoming status"
                        );
                    }
                },
                Membership::Irrelevant => {}
            }
        }

        let direct_live: Vec<StreamRecord> = direct_live
            .into_vec()
            .into_iter()
            .filter(|r| self.window.admits(r))
            .collect();
        let mentioned_live = live_mentions.into_groups();

        let live_ids: HashSet<&str> = direct_live
            .iter()
            .map(|r| r.id.as_str())
            .chain(mentioned_live.iter().map(|g| g.record.id.as_str()))
            .collect();

        let direct_upcoming: Vec<StreamRecord> = direct_upcoming
            .into_vec()
            .into_iter()
            .filter(|r| self.window.admits(r) && !live_ids.contains(r.id.as_str()))
            .collect();
        let mentioned_upcoming: Vec<MentionGroup> = upcoming_mentions
            .into_groups()
            .into_iter()
            .filter(|g| {
                self.window.admits(&g.record) && !live_ids.contains(g.record.id.as_str())
            })
            .collect();

        Qualified {
            direct_live,
            direct_upcoming,
            mentioned_live,
            mentioned_upcoming,
        }
    }

    /// Build the batch, or `None` when nothing new qualifies.
    ///
    /// Survivors are marked announced on `tracker`; the caller decides
    /// whether that state is persisted.
    pub fn build(
        &self,
        inputs: BatchInputs,
        tracker: &mut NoveltyTracker,
    ) -> Option<NotificationBatch> {
        let directory = directory(&inputs);
        let qualified = self.qualify(inputs);
        debug!(
            direct_live = qualified.direct_live.len(),
            direct_upcoming = qualified.direct_upcoming.len(),
            mentioned_live = qualified.mentioned_live.len(),
            mentioned_upcoming = qualified.mentioned_upcoming.len(),
            "Qualified streams"
        );

        let mut items = Vec::new();
        for record in qualified.direct_live.into_iter().chain(qualified.direct_upcoming) {
            if tracker.admit(&record) {
                items.push(BatchItem::direct(record));
            }
        }
        for group in qualified
            .mentioned_live
            .into_iter()
            .chain(qualified.mentioned_upcoming)
        {
            if tracker.admit(&group.record) {
                items.push(self.mentioned_item(group, &directory));
            }
        }

        if items.is_empty() {
            return None;
        }

        let identity = self.select_identity(&items, &directory);
        Some(NotificationBatch { items, identity })
    }

    /// Render qualifying records without consulting novelty state.
    #[must_use]
    pub fn items(&self, inputs: BatchInputs) -> Vec<BatchItem> {
        let directory = directory(&inputs);
        let qualified = self.qualify(inputs);

        let mut items: Vec<BatchItem> = qualified
            .direct_live
            .into_iter()
            .chain(qualified.direct_upcoming)
            .map(BatchItem::direct)
            .collect();
        items.extend(
            qualified
                .mentioned_live
                .into_iter()
                .chain(qualified.mentioned_upcoming)
                .map(|g| self.mentioned_item(g, &directory)),
        );
        items
    }

    /// Pick the representative identity for a set of items.
    fn select_identity(&self, items: &[BatchItem], directory: &Directory) -> Identity {
        let chosen = match self.identity_policy {
            IdentityPolicy::LatestDirectLive => items
                .iter()
                .rev()
                .find(|i| i.kind == ItemKind::Direct && i.is_live())
                .or_else(|| {
                    items
                        .iter()
                        .rev()
                        .find(|i| i.kind == ItemKind::Mentioned && i.is_live())
                })
                .and_then(BatchItem::identity_channel),
            IdentityPolicy::LatestAny => items.last().and_then(BatchItem::identity_channel),
            IdentityPolicy::FirstTracked => self.tracked.first().map(|c| c.id.as_str()),
        };

        chosen.map_or_else(
            || self.default_identity.clone(),
            |id| self.resolve(id, directory),
        )
    }

    /// Identity for a tracked channel: configured override, then what
    /// Holodex reported this run, then the default avatar.
    fn resolve(&self, channel_id: &str, directory: &Directory) -> Identity {
        let configured = self.tracked.get(channel_id);
        let seen = directory.get(channel_id);

        let name = configured
            .and_then(|c| c.nickname.clone())
            .or_else(|| seen.map(|c| c.display_name().to_string()))
            .unwrap_or_else(|| channel_id.to_string());
        let avatar_url = configured
            .and_then(|c| c.avatar_url.clone())
            .or_else(|| seen.and_then(|c| c.photo.clone()))
            .or_else(|| self.default_identity.avatar_url.clone());

        Identity { name, avatar_url }
    }

    fn mentioned_item(&self, group: MentionGroup, directory: &Directory) -> BatchItem {
        let attributed_names = group
            .attributed
            .iter()
            .map(|id| self.resolve(id, directory).name)
            .collect();
        BatchItem {
            kind: ItemKind::Mentioned,
            record: group.record,
            attributed_ids: group.attributed,
            attributed_names,
        }
    }

    fn is_mention_group(&self, group: &MentionGroup) -> bool {
        !self.tracked.contains(&group.record.channel.id) && !group.attributed.is_empty()
    }
}

/// Collect channel display data from every record in the inputs. Owner data
/// wins over mention data.
fn directory(inputs: &BatchInputs) -> Directory {
    let records = || {
        inputs
            .direct_live
            .iter()
            .chain(&inputs.direct_upcoming)
            .chain(inputs.mentioned_live.iter().map(|g| &g.record))
            .chain(inputs.mentioned_upcoming.iter().map(|g| &g.record))
    };

    let mut directory = Directory::new();
    for record in records() {
        directory.insert(record.channel.id.clone(), record.channel.clone());
    }
    for record in records() {
        for mention in &record.mentions {
            directory
                .entry(mention.id.clone())
                .or_insert_with(|| mention.clone());
        }
    }
    directory
}

/// Ordered list with one entry per stream ID; later records replace earlier
/// ones in place.
#[derive(Default)]
struct Distinct {
    records: Vec<StreamRecord>,
    index: HashMap<String, usize>,
}

impl Distinct {
    fn push(&mut self, record: StreamRecord) {
        if let Some(&i) = self.index.get(&record.id) {
            self.records[i] = record;
        } else {
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
    }

    fn into_vec(self) -> Vec<StreamRecord> {
        self.records
    }
}
