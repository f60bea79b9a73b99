//! Poll driver
//!
//! Fetches a snapshot on a fixed cadence and folds it into the shared
//! dashboard state. Cycles are serialized: a slow fetch delays the next tick
//! instead of overlapping it, so snapshots are always applied in order.
//! Failures never leave a cycle; they only change the status.
//!
//! A read that outlives the fetch timeout keeps running on the blocking
//! pool. Its handle is kept, and no new read is started until it finishes,
//! so a hung source occupies at most one blocking thread. Its late result
//! is discarded.

use crate::aggregator::SeriesAggregator;
use crate::core::{
    Config, DashboardView, DisplayRow, Error, PollStatus, Snapshot, SnapshotFailure,
};
use crate::provider::{fetch_snapshot, SnapshotProvider};
use crate::table;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// State shared between the poll loop (single writer) and readers
pub struct MonitorState {
    aggregator: SeriesAggregator,
    rows: Vec<DisplayRow>,
    last_raw_text: String,
    status: PollStatus,
    failed_polls: u64,
}

impl MonitorState {
    pub fn new(aggregator: SeriesAggregator) -> Self {
        Self {
            aggregator,
            rows: Vec::new(),
            last_raw_text: String::new(),
            status: PollStatus::Waiting,
            failed_polls: 0,
        }
    }

    /// Ingest and project in one step
    fn apply_snapshot(&mut self, snapshot: Snapshot) -> PollStatus {
        self.aggregator.ingest(&snapshot);
        self.rows = table::project(&snapshot);
        self.status = PollStatus::Ok {
            timestamp: snapshot.timestamp,
            entries: snapshot.entries.len(),
        };
        self.last_raw_text = snapshot.raw_text;
        self.status.clone()
    }

    /// Record a failed cycle; the window is left untouched
    fn apply_failure(&mut self, failure: SnapshotFailure) -> PollStatus {
        let repeated = matches!(
            &self.status,
            PollStatus::Failed { failure: previous } if previous.reason == failure.reason
        );
        if repeated {
            log::debug!("Poll failed again: {}", failure);
        } else {
            log::warn!("Poll failed: {}", failure);
        }

        if let Some(raw) = &failure.raw_text {
            self.last_raw_text = raw.clone();
        }
        self.failed_polls += 1;
        self.status = PollStatus::Failed { failure };
        self.status.clone()
    }

    pub fn aggregator(&self) -> &SeriesAggregator {
        &self.aggregator
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            status: self.status.clone(),
            chart: self.aggregator.chart_view(),
            rows: self.rows.clone(),
            last_raw_text: self.last_raw_text.clone(),
            tick_count: self.aggregator.tick_count(),
            failed_polls: self.failed_polls,
        }
    }
}

type FetchResult = Result<Snapshot, SnapshotFailure>;

/// Periodic collector for one snapshot source
pub struct EnergyMonitor {
    provider: Arc<dyn SnapshotProvider>,
    state: Arc<RwLock<MonitorState>>,
    poll_interval: Duration,
    fetch_timeout: Duration,
    status_tx: watch::Sender<PollStatus>,
    /// Read that timed out and is still running
    pending: Mutex<Option<JoinHandle<FetchResult>>>,
}

impl EnergyMonitor {
    pub fn new(provider: Arc<dyn SnapshotProvider>, config: &Config) -> Self {
        Self::with_aggregator(
            provider,
            SeriesAggregator::from_config(config),
            Duration::from_millis(config.general.poll_interval_ms),
            Duration::from_millis(config.source.timeout_ms),
        )
    }

    pub fn with_aggregator(
        provider: Arc<dyn SnapshotProvider>,
        aggregator: SeriesAggregator,
        poll_interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(PollStatus::Waiting);
        Self {
            provider,
            state: Arc::new(RwLock::new(MonitorState::new(aggregator))),
            poll_interval,
            fetch_timeout,
            status_tx,
            pending: Mutex::new(None),
        }
    }

    /// Status updates, one per completed cycle
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status_tx.subscribe()
    }

    pub fn source_name(&self) -> &str {
        self.provider.name()
    }

    /// Consistent copy of everything a dashboard shows
    pub async fn dashboard(&self) -> DashboardView {
        self.state.read().await.view()
    }

    /// Run `f` against the state under the read lock
    pub async fn read<R>(&self, f: impl FnOnce(&MonitorState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Fetch one snapshot stamped with the current time, without applying it.
    ///
    /// Fails with a transport failure while an earlier timed-out read is
    /// still running; no second read is started in that case.
    pub async fn fetch(&self) -> FetchResult {
        let mut pending = self.pending.lock().await;

        if let Some(previous) = pending.as_ref() {
            if !previous.is_finished() {
                return Err(SnapshotFailure::from(Error::TransportFailure(
                    "previous read still in progress".to_string(),
                )));
            }
            log::debug!("Discarding late result of a timed-out read");
            *pending = None;
        }

        let timestamp = chrono::Utc::now().timestamp();
        let provider = Arc::clone(&self.provider);
        let handle = pending.insert(tokio::task::spawn_blocking(move || {
            fetch_snapshot(provider.as_ref(), timestamp)
        }));

        let outcome = tokio::time::timeout(self.fetch_timeout, handle).await;
        match outcome {
            Ok(joined) => {
                *pending = None;
                joined.unwrap_or_else(|join_error| {
                    Err(SnapshotFailure::from(Error::TransportFailure(format!(
                        "provider task failed: {}",
                        join_error
                    ))))
                })
            }
            Err(_) => Err(SnapshotFailure::from(Error::TransportFailure(format!(
                "no response within {} ms",
                self.fetch_timeout.as_millis()
            )))),
        }
    }

    /// Run exactly one fetch/ingest cycle
    pub async fn poll_once(&self) -> PollStatus {
        let result = self.fetch().await;
        self.apply(result).await
    }

    async fn apply(&self, result: FetchResult) -> PollStatus {
        let status = {
            let mut state = self.state.write().await;
            match result {
                Ok(snapshot) => state.apply_snapshot(snapshot),
                Err(failure) => state.apply_failure(failure),
            }
        };
        self.status_tx.send_replace(status.clone());
        status
    }

    /// Poll until `cancel` fires.
    ///
    /// A fetch still in flight at cancellation is dropped without touching
    /// the window. The blocking read itself is not interrupted.
    pub async fn run(&self, cancel: CancellationToken) {
        log::info!(
            "Starting poll loop on {} every {}ms",
            self.provider.name(),
            self.poll_interval.as_millis()
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Cancelled during fetch, discarding in-flight snapshot");
                    break;
                }
                result = self.fetch() => result,
            };

            self.apply(result).await;
        }

        {
            let mut state = self.state.write().await;
            state.status = PollStatus::Stopped;
        }
        self.status_tx.send_replace(PollStatus::Stopped);
        log::info!("Poll loop stopped");
    }
}
