//! Forward-looking time window for upcoming streams.

use chrono::{DateTime, Duration, Utc};

use crate::holodex::{StreamRecord, StreamStatus};

/// True iff `now <= scheduled <= now + horizon`.
#[must_use]
pub fn in_window(now: DateTime<Utc>, scheduled: DateTime<Utc>, horizon: Duration) -> bool {
    if scheduled < now {
        return false;
    }
    match now.checked_add_signed(horizon) {
        Some(end) => scheduled <= end,
        None => true,
    }
}

/// A window anchored at a single `now`, shared by every comparison in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    now: DateTime<Utc>,
    horizon: Duration,
}

impl TimeWindow {
    /// Anchor a window at `now`.
    #[must_use]
    pub const fn starting_at(now: DateTime<Utc>, horizon: Duration) -> Self {
        Self { now, horizon }
    }

    /// Whether a scheduled instant falls inside the window.
    #[must_use]
    pub fn contains(&self, scheduled: DateTime<Utc>) -> bool {
        in_window(self.now, scheduled, self.horizon)
    }

    /// Whether a record qualifies on timing alone.
    ///
    /// Live streams always qualify. Upcoming streams need a scheduled start
    /// inside the window.
    #[must_use]
    pub fn admits(&self, record: &StreamRecord) -> bool {
        match record.status {
            StreamStatus::Live => true,
            StreamStatus::Upcoming => record.start_scheduled.is_some_and(|at| self.contains(at)),
            StreamStatus::Other => false,
        }
    }
}
