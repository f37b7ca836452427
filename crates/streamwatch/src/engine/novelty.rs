//! Tracks which broadcasts have already been announced.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::holodex::StreamRecord;

/// Which records pass through the novelty tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Live and upcoming records are both announced at most once.
    #[default]
    All,
    /// Only upcoming records are deduplicated; live records are announced on
    /// every run and never recorded.
    UpcomingOnly,
}

impl FromStr for DedupPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "upcoming-only" | "upcoming" => Ok(Self::UpcomingOnly),
            _ => Err(ConfigError::Invalid {
                field: "dedup",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::UpcomingOnly => "upcoming-only",
        })
    }
}

/// Novelty state over stream IDs.
///
/// An ID is either unseen or announced. Announced is terminal once persisted.
/// Before that, announcements from this run that never reached the sink can be
/// withdrawn with [`NoveltyTracker::retain_delivered`].
#[derive(Debug, Clone, Default)]
pub struct NoveltyTracker {
    announced: HashSet<String>,
    newly_announced: Vec<String>,
    policy: DedupPolicy,
}

impl NoveltyTracker {
    /// Start from a previously persisted set.
    #[must_use]
    pub fn new(announced: HashSet<String>, policy: DedupPolicy) -> Self {
        Self {
            announced,
            newly_announced: Vec::new(),
            policy,
        }
    }

    /// True iff the ID has not been announced.
    #[must_use]
    pub fn should_announce(&self, id: &str) -> bool {
        !self.announced.contains(id)
    }

    /// Record an announcement. Returns whether the ID was new.
    pub fn mark_announced(&mut self, id: &str) -> bool {
        if self.announced.insert(id.to_string()) {
            self.newly_announced.push(id.to_string());
            true
        } else {
            false
        }
    }

    /// Decide whether a record goes out in this batch, recording it if so.
    pub fn admit(&mut self, record: &StreamRecord) -> bool {
        if self.policy == DedupPolicy::UpcomingOnly && record.is_live() {
            return true;
        }
        self.mark_announced(&record.id)
    }

    /// Withdraw this run's announcements that are not in `delivered`.
    /// Previously persisted IDs are never touched.
    pub fn retain_delivered(&mut self, delivered: &[String]) {
        let delivered: HashSet<&str> = delivered.iter().map(String::as_str).collect();
        let announced = &mut self.announced;
        self.newly_announced.retain(|id| {
            let keep = delivered.contains(id.as_str());
            if !keep {
                announced.remove(id);
            }
            keep
        });
    }

    /// IDs recorded during this run, in order.
    #[must_use]
    pub fn newly_announced(&self) -> &[String] {
        &self.newly_announced
    }

    /// Full announced set.
    #[must_use]
    pub fn announced(&self) -> &HashSet<String> {
        &self.announced
    }
}
