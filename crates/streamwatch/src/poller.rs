//! Fan-out of Holodex queries for one run.
//!
//! A run issues one unfiltered `live` query, one unfiltered `upcoming` query
//! and a `live` plus `upcoming` mention query per tracked channel. Queries run
//! with bounded concurrency and a per-call timeout. A failed query is logged
//! and treated as an empty result so one bad call never sinks the run.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{TrackedChannels, WatchConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use crate::engine::{BatchInputs, MentionAggregator};
use crate::error::SourceError;
use crate::holodex::{StreamQuery, StreamRecord, StreamSource, StreamStatus};

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Upper bound for a single query.
    pub request_timeout: Duration,
    /// Queries in flight at once.
    pub concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl From<&WatchConfig> for PollConfig {
    fn from(config: &WatchConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            concurrency: config.concurrency,
        }
    }
}

/// Everything one poll saw.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Merged inputs for the batch builder.
    pub inputs: BatchInputs,
    /// Queries issued.
    pub queries: usize,
    /// Queries that failed or timed out.
    pub failed: usize,
    /// Records returned across all successful queries.
    pub fetched: usize,
}

impl Snapshot {
    /// Hand the merged inputs to the batch builder.
    #[must_use]
    pub fn into_inputs(self) -> BatchInputs {
        self.inputs
    }
}

/// Issues the queries for one run.
pub struct Poller {
    source: Arc<dyn StreamSource>,
    config: PollConfig,
}

impl Poller {
    /// Create a poller over a stream source.
    #[must_use]
    pub fn new(source: Arc<dyn StreamSource>, config: PollConfig) -> Self {
        Self { source, config }
    }

    /// Queries issued for a channel list, in order.
    #[must_use]
    pub fn queries(tracked: &TrackedChannels) -> Vec<StreamQuery> {
        let mut queries = vec![
            StreamQuery::all(StreamStatus::Live),
            StreamQuery::all(StreamStatus::Upcoming),
        ];
        for channel in tracked.iter() {
            queries.push(StreamQuery::mentioning(StreamStatus::Live, &channel.id));
            queries.push(StreamQuery::mentioning(StreamStatus::Upcoming, &channel.id));
        }
        queries
    }

    /// Run every query and merge the results.
    pub async fn poll(&self, tracked: &TrackedChannels) -> Snapshot {
        let queries = Self::queries(tracked);
        let width = self.config.concurrency.max(1);

        debug!(queries = queries.len(), concurrency = width, "Polling Holodex");

        // `buffered` keeps results in query order.
        let results: Vec<(StreamQuery, Result<Vec<StreamRecord>, SourceError>)> =
            stream::iter(queries)
                .map(|query| async move {
                    let result = self.fetch(&query).await;
                    (query, result)
                })
                .buffered(width)
                .collect()
                .await;

        let mut snapshot = Snapshot {
            queries: results.len(),
            ..Snapshot::default()
        };
        let mut live_mentions = MentionAggregator::new();
        let mut upcoming_mentions = MentionAggregator::new();

        for (query, result) in results {
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    warn!(query = %query, error = %e, "Holodex query failed, treating as empty");
                    snapshot.failed += 1;
                    continue;
                }
            };
            snapshot.fetched += records.len();

            match (&query.mentioned_channel_id, query.status) {
                (None, StreamStatus::Live) => snapshot.inputs.direct_live.extend(records),
                (None, _) => snapshot.inputs.direct_upcoming.extend(records),
                (Some(channel_id), StreamStatus::Live) => {
                    live_mentions.absorb_query(channel_id, records, tracked);
                }
                (Some(channel_id), _) => {
                    upcoming_mentions.absorb_query(channel_id, records, tracked);
                }
            }
        }

        snapshot.inputs.mentioned_live = live_mentions.into_groups();
        snapshot.inputs.mentioned_upcoming = upcoming_mentions.into_groups();

        info!(
            queries = snapshot.queries,
            failed = snapshot.failed,
            fetched = snapshot.fetched,
            "Poll complete"
        );
        snapshot
    }

    async fn fetch(&self, query: &StreamQuery) -> Result<Vec<StreamRecord>, SourceError> {
        tokio::time::timeout(self.config.request_timeout, self.source.fetch(query))
            .await
            .map_err(|_| SourceError::Timeout(self.config.request_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holodex::{ChannelRef, MockStreamSource};

    fn tracked() -> TrackedChannels {
        TrackedChannels::from_ids(["UC1", "UC2"])
    }

    fn record(id: &str, channel: &str, status: StreamStatus) -> StreamRecord {
        StreamRecord::new(id, ChannelRef::new(channel, channel), "t", status)
    }

    fn poller(source: MockStreamSource) -> Poller {
        Poller::new(Arc::new(source), PollConfig::default())
    }

    #[test]
    fn test_query_plan() {
        let queries = Poller::queries(&tracked());

        assert_eq!(queries.len(), 6);
        assert_eq!(queries[0], StreamQuery::all(StreamStatus::Live));
        assert_eq!(queries[1], StreamQuery::all(StreamStatus::Upcoming));
        assert_eq!(queries[2], StreamQuery::mentioning(StreamStatus::Live, "UC1"));
        assert_eq!(queries[5], StreamQuery::mentioning(StreamStatus::Upcoming, "UC2"));
    }

    #[tokio::test]
    async fn test_routes_results_by_query() {
        let mut source = MockStreamSource::new();
        source.expect_fetch().times(6).returning(|query| {
            Ok(match (query.mentioned_channel_id.as_deref(), query.status) {
                (None, StreamStatus::Live) => vec![record("d1", "UC1", StreamStatus::Live)],
                (None, _) => vec![record("d2", "UC2", StreamStatus::Upcoming)],
                (Some("UC1" | "UC2"), StreamStatus::Live) => {
                    vec![record("collab", "UCX", StreamStatus::Live)]
                }
                _ => Vec::new(),
            })
        });

        let snapshot = poller(source).poll(&tracked()).await;

        assert_eq!(snapshot.queries, 6);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.fetched, 4);
        let inputs = snapshot.into_inputs();
        assert_eq!(inputs.direct_live[0].id, "d1");
        assert_eq!(inputs.direct_upcoming[0].id, "d2");
        assert_eq!(inputs.mentioned_live.len(), 1);
        assert_eq!(inputs.mentioned_live[0].attributed, ["UC1", "UC2"]);
        assert!(inputs.mentioned_upcoming.is_empty());
    }

    #[tokio::test]
    async fn test_failed_query_is_empty() {
        let mut source = MockStreamSource::new();
        source.expect_fetch().returning(|query| {
            if query.mentioned_channel_id.is_some() {
                Err(SourceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(vec![record("d1", "UC1", query.status)])
            }
        });

        let snapshot = poller(source).poll(&tracked()).await;

        assert_eq!(snapshot.failed, 4);
        assert_eq!(snapshot.inputs.direct_live.len(), 1);
        assert!(snapshot.inputs.mentioned_live.is_empty());
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl StreamSource for SlowSource {
        async fn fetch(&self, _query: &StreamQuery) -> Result<Vec<StreamRecord>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out() {
        let poller = Poller::new(
            Arc::new(SlowSource),
            PollConfig {
                request_timeout: Duration::from_secs(1),
                concurrency: 2,
            },
        );

        let snapshot = poller.poll(&TrackedChannels::from_ids(["UC1"])).await;

        assert_eq!(snapshot.queries, 4);
        assert_eq!(snapshot.failed, 4);
    }
}
