//! One watcher run: load state, poll, build, send, persist.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::WatchConfig;
use crate::engine::{BatchBuilder, NotificationBatch, NoveltyTracker, TimeWindow};
use crate::error::DispatchError;
use crate::holodex::StreamSource;
use crate::notify::NotificationSink;
use crate::poller::{PollConfig, Poller};
use crate::store::NotifiedStore;

/// What happened to the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing new qualified, the sink was not called.
    Nothing,
    /// The sink accepted the batch.
    Sent,
    /// The sink refused or was unreachable.
    Failed(String),
    /// A batch was built but deliberately not sent.
    DryRun,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("nothing to send"),
            Self::Sent => f.write_str("sent"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::DryRun => f.write_str("dry run"),
        }
    }
}

/// Result of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Holodex queries issued.
    pub queries: usize,
    /// Queries that failed and were treated as empty.
    pub failed_queries: usize,
    /// Records returned by Holodex.
    pub fetched: usize,
    /// Items in the batch.
    pub announced: usize,
    /// Items that reached the sink.
    pub delivered: usize,
    /// Delivery outcome.
    pub delivery: Delivery,
    /// Whether the notified set was written.
    pub persisted: bool,
}

impl RunSummary {
    /// Whether the run should be reported as failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.delivery, Delivery::Failed(_))
    }
}

/// A built but unsent run.
#[derive(Debug)]
pub struct Plan {
    /// Batch to send, if anything new qualified.
    pub batch: Option<NotificationBatch>,
    /// Novelty state including the batch's items.
    pub tracker: NoveltyTracker,
    /// Counts so far. Delivery is `Nothing` or `DryRun`.
    pub summary: RunSummary,
}

/// Wires the poller, engine, sink and store together for one run.
pub struct Dispatcher {
    config: WatchConfig,
    poller: Poller,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn NotifiedStore>,
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        config: WatchConfig,
        source: Arc<dyn StreamSource>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn NotifiedStore>,
    ) -> Self {
        let poller = Poller::new(source, PollConfig::from(&config));
        Self {
            config,
            poller,
            sink,
            store,
        }
    }

    /// Poll and build the batch without sending or persisting anything.
    pub async fn plan(&self, now: DateTime<Utc>) -> Result<Plan, DispatchError> {
        let announced = self.store.load().await?;
        info!(
            tracked = self.config.tracked.len(),
            already_announced = announced.len(),
            "Starting run"
        );

        let snapshot = self.poller.poll(&self.config.tracked).await;
        let mut summary = RunSummary {
            queries: snapshot.queries,
            failed_queries: snapshot.failed,
            fetched: snapshot.fetched,
            announced: 0,
            delivered: 0,
            delivery: Delivery::Nothing,
            persisted: false,
        };

        let mut tracker = NoveltyTracker::new(announced, self.config.dedup_policy);
        let builder = BatchBuilder::new(
            &self.config.tracked,
            TimeWindow::starting_at(now, self.config.horizon),
            self.config.identity_policy,
            &self.config.default_identity,
        );
        let batch = builder.build(snapshot.into_inputs(), &mut tracker);

        if let Some(batch) = &batch {
            summary.announced = batch.len();
            summary.delivery = Delivery::DryRun;
        }

        Ok(Plan {
            batch,
            tracker,
            summary,
        })
    }

    /// Run once: send anything new and persist what was delivered.
    ///
    /// Only a failure to load the notified set is an error. Sink failures are
    /// reported through [`RunSummary::delivery`]. Streams the sink never
    /// delivered stay unannounced so the next run retries exactly those.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunSummary, DispatchError> {
        let Plan {
            batch,
            mut tracker,
            mut summary,
        } = self.plan(now).await?;

        let Some(batch) = batch else {
            info!("Nothing new to announce");
            return Ok(summary);
        };

        info!(
            sink = self.sink.name(),
            items = batch.len(),
            identity = %batch.identity.name,
            "Sending notification"
        );

        match self.sink.send(&batch).await {
            Ok(()) => {
                summary.delivered = batch.len();
                summary.delivery = Delivery::Sent;
            }
            Err(e) => {
                error!(
                    sink = self.sink.name(),
                    error = %e,
                    delivered = e.delivered.len(),
                    "Notification failed"
                );
                summary.delivered = e.delivered.len();
                summary.delivery = Delivery::Failed(e.to_string());
                if e.delivered.is_empty() {
                    return Ok(summary);
                }
                tracker.retain_delivered(&e.delivered);
            }
        }

        match self.store.save(tracker.announced()).await {
            Ok(()) => {
                summary.persisted = true;
                info!(
                    newly_announced = tracker.newly_announced().len(),
                    total = tracker.announced().len(),
                    "Run complete"
                );
            }
            Err(e) => {
                warn!(error = %e, "Failed to save notified set, streams may be announced again");
            }
        }

        Ok(summary)
    }
}
