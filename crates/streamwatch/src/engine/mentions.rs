//! Merging of per-channel mention query results.
//!
//! Holodex answers "streams mentioning channel X" one channel at a time, so a
//! collaboration involving several tracked channels comes back once per
//! channel. The aggregator folds those sightings into one group per stream.

use std::collections::HashMap;

use tracing::debug;

use super::membership::tracked_mentions;
use crate::config::TrackedChannels;
use crate::holodex::StreamRecord;

/// One broadcast reached through mentions, with every tracked channel that
/// led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionGroup {
    /// Latest sighting of the broadcast.
    pub record: StreamRecord,
    /// Attributed tracked channel IDs, in discovery order.
    pub attributed: Vec<String>,
}

impl MentionGroup {
    /// Start a group with a single attribution.
    #[must_use]
    pub fn new(record: StreamRecord, attributed: Vec<String>) -> Self {
        let mut group = Self {
            record,
            attributed: Vec::with_capacity(attributed.len()),
        };
        for id in attributed {
            group.attribute(id);
        }
        group
    }

    /// First attributed tracked channel.
    #[must_use]
    pub fn first_attributed(&self) -> Option<&str> {
        self.attributed.first().map(String::as_str)
    }

    fn attribute(&mut self, channel_id: String) {
        if !self.attributed.contains(&channel_id) {
            self.attributed.push(channel_id);
        }
    }
}

/// Groups mention sightings by stream ID.
#[derive(Debug, Default)]
pub struct MentionAggregator {
    groups: Vec<MentionGroup>,
    index: HashMap<String, usize>,
}

impl MentionAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in an already aggregated group.
    pub fn absorb_group(&mut self, group: MentionGroup) {
        self.insert(group.record, group.attributed);
    }

    /// Fold in the result of a "mentions `querying_channel`" query.
    ///
    /// Records owned by a tracked channel are dropped: they belong to the
    /// direct path.
    pub fn absorb_query(
        &mut self,
        querying_channel: &str,
        records: Vec<StreamRecord>,
        tracked: &TrackedChannels,
    ) {
        for record in records {
            if tracked.contains(&record.channel.id) {
                debug!(
                    stream_id = %record.id,
                    channel_id = %record.channel.id,
                    "Mention result owned by a tracked channel, leaving it to the direct path"
                );
                continue;
            }
            self.insert(record, vec![querying_channel.to_string()]);
        }
    }

    /// Fold in a record found outside a mention query, attributing it to the
    /// tracked channels it names. Records without such mentions, or owned by a
    /// tracked channel, are ignored.
    pub fn absorb_record(&mut self, record: StreamRecord, tracked: &TrackedChannels) {
        if tracked.contains(&record.channel.id) {
            return;
        }
        let attributed = tracked_mentions(&record, tracked);
        if attributed.is_empty() {
            return;
        }
        self.insert(record, attributed);
    }

    /// Groups in first-discovery order.
    #[must_use]
    pub fn into_groups(self) -> Vec<MentionGroup> {
        self.groups
    }

    fn insert(&mut self, record: StreamRecord, attributed: Vec<String>) {
        if let Some(&i) = self.index.get(&record.id) {
            let group = &mut self.groups[i];
            // Later sightings carry fresher display data; position stays put.
            group.record = record;
            for id in attributed {
                group.attribute(id);
            }
        } else {
            self.index.insert(record.id.clone(), self.groups.len());
            self.groups.push(MentionGroup::new(record, attributed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holodex::{ChannelRef, StreamStatus};

    fn aggregate(
        results: Vec<(String, Vec<StreamRecord>)>,
        tracked: &TrackedChannels,
    ) -> Vec<MentionGroup> {
        let mut aggregator = MentionAggregator::new();
        for (channel_id, records) in results {
            aggregator.absorb_query(&channel_id, records, tracked);
        }
        aggregator.into_groups()
    }

    fn collab(id: &str, owner: &str, title: &str) -> StreamRecord {
        StreamRecord::new(id, ChannelRef::new(owner, owner), title, StreamStatus::Upcoming)
    }

    #[test]
    fn test_same_stream_from_two_queries_is_merged() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let groups = aggregate(
            vec![
                ("A".to_string(), vec![collab("s1", "Y", "collab")]),
                ("B".to_string(), vec![collab("s1", "Y", "collab")]),
            ],
            &tracked,
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].record.id, "s1");
        assert_eq!(groups[0].attributed, ["A", "B"]);
    }

    #[test]
    fn test_owned_by_tracked_channel_is_dropped() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let groups = aggregate(
            vec![("A".to_string(), vec![collab("s1", "B", "B's own stream")])],
            &tracked,
        );
        assert!(groups.is_empty());
    }

    #[test]
    fn test_first_discovery_order() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let groups = aggregate(
            vec![
                (
                    "A".to_string(),
                    vec![collab("s2", "Y", "two"), collab("s1", "Y", "one")],
                ),
                (
                    "B".to_string(),
                    vec![collab("s3", "Z", "three"), collab("s2", "Y", "two")],
                ),
            ],
            &tracked,
        );

        let ids: Vec<_> = groups.iter().map(|g| g.record.id.as_str()).collect();
        assert_eq!(ids, ["s2", "s1", "s3"]);
        assert_eq!(groups[0].attributed, ["A", "B"]);
    }

    #[test]
    fn test_later_sighting_refreshes_record() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let groups = aggregate(
            vec![
                ("A".to_string(), vec![collab("s1", "Y", "old title")]),
                ("B".to_string(), vec![collab("s1", "Y", "new title")]),
            ],
            &tracked,
        );
        assert_eq!(groups[0].record.title, "new title");
    }

    #[test]
    fn test_absorb_record_uses_tracked_mentions() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let mut aggregator = MentionAggregator::new();
        for group in aggregate(
            vec![("A".to_string(), vec![collab("s1", "Y", "collab")])],
            &tracked,
        ) {
            aggregator.absorb_group(group);
        }

        let seen_elsewhere = collab("s1", "Y", "collab").with_mentions(vec![
            ChannelRef::new("B", "B"),
            ChannelRef::new("Q", "Q"),
        ]);
        aggregator.absorb_record(seen_elsewhere, &tracked);

        let unrelated = collab("s9", "Y", "solo");
        aggregator.absorb_record(unrelated, &tracked);

        let groups = aggregator.into_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].attributed, ["A", "B"]);
    }
}
