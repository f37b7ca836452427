//! Classification, dedup and batch assembly.
//!
//! Everything here is synchronous and free of I/O. The only state is the
//! [`NoveltyTracker`], which the dispatcher loads before a run and persists
//! after a successful send.

mod batch;
mod membership;
mod mentions;
mod novelty;
mod window;

pub use batch::{
    BatchBuilder, BatchInputs, BatchItem, Identity, IdentityPolicy, ItemKind, NotificationBatch,
    Qualified,
};
pub use membership::{classify, tracked_mentions, Membership};
pub use mentions::{MentionAggregator, MentionGroup};
pub use novelty::{DedupPolicy, NoveltyTracker};
pub use window::{in_window, TimeWindow};
