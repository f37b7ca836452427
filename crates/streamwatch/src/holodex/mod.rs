//! Holodex stream source.
//!
//! Provides the stream record types and the HTTP client for the `/live`
//! endpoint.

mod client;
mod types;

pub use client::{HolodexClient, StreamQuery, StreamSource, DEFAULT_API_BASE};
pub use types::{ChannelRef, StreamRecord, StreamStatus};

#[cfg(test)]
pub use client::MockStreamSource;
