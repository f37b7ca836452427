//! Tracked-channel membership.

use crate::config::TrackedChannels;
use crate::holodex::StreamRecord;

/// How a record relates to the tracked channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Owned by a tracked channel.
    Direct,
    /// Owned elsewhere but mentions a tracked channel.
    Mentioned,
    /// Neither.
    Irrelevant,
}

/// Classify a record. Ownership wins over mentions.
#[must_use]
pub fn classify(record: &StreamRecord, tracked: &TrackedChannels) -> Membership {
    if tracked.contains(&record.channel.id) {
        Membership::Direct
    } else if record.mentions.iter().any(|m| tracked.contains(&m.id)) {
        Membership::Mentioned
    } else {
        Membership::Irrelevant
    }
}

/// Tracked channels a record mentions, in mention order.
#[must_use]
pub fn tracked_mentions(record: &StreamRecord, tracked: &TrackedChannels) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for mention in &record.mentions {
        if tracked.contains(&mention.id) && !ids.contains(&mention.id) {
            ids.push(mention.id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holodex::{ChannelRef, StreamStatus};

    fn record(owner: &str, mentions: &[&str]) -> StreamRecord {
        StreamRecord::new("s", ChannelRef::new(owner, owner), "t", StreamStatus::Live)
            .with_mentions(mentions.iter().map(|m| ChannelRef::new(*m, *m)).collect())
    }

    #[test]
    fn test_direct() {
        let tracked = TrackedChannels::from_ids(["X"]);
        assert_eq!(classify(&record("X", &[]), &tracked), Membership::Direct);
    }

    #[test]
    fn test_mentioned() {
        let tracked = TrackedChannels::from_ids(["X"]);
        assert_eq!(classify(&record("Y", &["Z", "X"]), &tracked), Membership::Mentioned);
    }

    #[test]
    fn test_irrelevant() {
        let tracked = TrackedChannels::from_ids(["X"]);
        assert_eq!(classify(&record("Y", &["Z"]), &tracked), Membership::Irrelevant);
        assert_eq!(classify(&record("Y", &[]), &tracked), Membership::Irrelevant);
    }

    #[test]
    fn test_direct_takes_precedence_over_mention() {
        let tracked = TrackedChannels::from_ids(["X", "W"]);
        assert_eq!(classify(&record("X", &["W"]), &tracked), Membership::Direct);
    }

    #[test]
    fn test_tracked_mentions_keeps_order_and_dedups() {
        let tracked = TrackedChannels::from_ids(["A", "B"]);
        let r = record("Y", &["B", "Z", "A", "B"]);
        assert_eq!(tracked_mentions(&r, &tracked), ["B", "A"]);
    }
}
