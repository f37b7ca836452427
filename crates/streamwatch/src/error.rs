//! Error types for the stream watcher.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from a single Stream Source call.
///
/// The dispatcher never propagates these: a failed call contributes an empty
/// list for that query and the run carries on.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Holodex returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a JSON array of streams
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The call did not finish within the per-call timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur when delivering a notification batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the service asked us to wait
        retry_after_secs: u64,
    },

    /// The webhook rejected the message
    #[error("Webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A batch the sink did not fully deliver.
///
/// Large batches go out as several messages. `delivered` lists the stream IDs
/// of the messages accepted before `source` stopped the send, in batch order.
#[derive(Debug, Error)]
#[error("{source} ({} streams delivered before the failure)", .delivered.len())]
pub struct SendError {
    /// Streams that reached the destination.
    pub delivered: Vec<String>,
    /// Failure that stopped the send.
    #[source]
    pub source: SinkError,
}

impl From<SinkError> for SendError {
    fn from(source: SinkError) -> Self {
        Self {
            delivered: Vec::new(),
            source,
        }
    }
}

/// Errors from the notified-set store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the state file failed
    #[error("State file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Startup configuration errors. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential was not supplied
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// The tracked channel file could not be read
    #[error("Cannot read channel list {path}: {source}")]
    ChannelsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tracked channel file is not valid JSON of the expected shape
    #[error("Invalid channel list {path}: {source}")]
    ChannelsInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The tracked channel list is empty
    #[error("No tracked channels configured")]
    NoChannels,

    /// A setting had a value outside its accepted range
    #[error("Invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Errors that abort a run before anything is sent.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The notified set could not be loaded
    #[error("Failed to load notified set: {0}")]
    Store(#[from] StoreError),
}
