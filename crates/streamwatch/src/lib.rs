//! Live stream watcher for tracked Holodex channels.
//!
//! This crate provides:
//! - Holodex polling for live and upcoming streams, including collaboration
//!   streams that mention a tracked channel
//! - Classification into live and starting-soon windows
//! - Deduplication of already announced broadcasts across runs
//! - Discord webhook notifications with a single representative identity
//!
//! # Architecture
//!
//! - [`holodex::StreamSource`] fetches raw stream records
//! - [`poller::Poller`] fans the queries out and merges mention results
//! - [`engine`] holds the pure classification, window and novelty logic
//! - [`notify::NotificationSink`] delivers a rendered batch
//! - [`store::NotifiedStore`] persists announced stream ids between runs
//! - [`dispatcher::Dispatcher`] wires one run together

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod holodex;
pub mod notify;
pub mod poller;
pub mod store;

// Re-export main types
pub use config::{TrackedChannel, TrackedChannels, WatchConfig};
pub use dispatcher::{Delivery, Dispatcher, Plan, RunSummary};
pub use engine::{
    BatchBuilder, BatchInputs, BatchItem, DedupPolicy, Identity, IdentityPolicy, ItemKind,
    MentionAggregator, MentionGroup, NotificationBatch, NoveltyTracker, TimeWindow,
};
pub use error::{ConfigError, DispatchError, SendError, SinkError, SourceError, StoreError};
pub use holodex::{ChannelRef, HolodexClient, StreamQuery, StreamRecord, StreamSource, StreamStatus};
pub use notify::{DiscordSink, NotificationSink, RenderMode};
pub use poller::{PollConfig, Poller, Snapshot};
pub use store::{JsonFileStore, MemoryStore, NotifiedStore};
