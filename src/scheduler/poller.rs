//! Per-feed polling fetcher.
//!
//! Fetches once on start, then on every interval tick and on demand. Fetches
//! may overlap; each one is tagged with a sequence number at issue time and
//! its outcome is applied only if no newer fetch has been issued since.

use crate::fetch::{FetchError, SensorSource};
use crate::pipeline::{self, SortedSeries, ZoneSchema};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// Whether any fetch is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    Idle,
    Fetching,
}

/// Point-in-time copy of a feed's state.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub phase: FetchPhase,
    pub series: Option<Arc<SortedSeries>>,
    pub metrics: Vec<String>,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub issued_seq: u64,
    pub applied_seq: u64,
    pub in_flight: u32,
}

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub label: String,
    pub interval: Duration,
    pub schema: ZoneSchema,
}

#[derive(Debug, Default)]
struct FeedState {
    series: Option<Arc<SortedSeries>>,
    last_error: Option<String>,
    last_success: Option<DateTime<Utc>>,
    last_attempt: Option<DateTime<Utc>>,
    issued_seq: u64,
    applied_seq: u64,
    in_flight: u32,
    stopped: bool,
}

type SharedState = Arc<Mutex<FeedState>>;

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What happened to a completed fetch.
#[derive(Debug)]
enum Outcome {
    Applied { readings: usize, unparsable: usize },
    Failed(FetchError),
    Superseded { latest: u64 },
    Stopped,
}

/// Owned handle to a running poller. Dropping it stops the poller.
pub struct PollHandle {
    settings: Arc<PollSettings>,
    state: SharedState,
    refresh: Arc<Notify>,
    stop_tx: broadcast::Sender<()>,
}

impl PollHandle {
    /// Start polling `source`. The first fetch is issued immediately.
    pub fn spawn<S: SensorSource>(source: Arc<S>, settings: PollSettings) -> Self {
        let settings = Arc::new(settings);
        let state: SharedState = Arc::new(Mutex::new(FeedState::default()));
        let refresh = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = broadcast::channel(1);

        tokio::spawn(run_poll_loop(
            source,
            settings.clone(),
            state.clone(),
            refresh.clone(),
            stop_rx,
        ));

        Self {
            settings,
            state,
            refresh,
            stop_tx,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let s = lock(&self.state);
        FeedSnapshot {
            phase: if s.in_flight > 0 {
                FetchPhase::Fetching
            } else {
                FetchPhase::Idle
            },
            series: s.series.clone(),
            metrics: self.settings.schema.metrics(),
            last_error: s.last_error.clone(),
            last_success: s.last_success,
            last_attempt: s.last_attempt,
            issued_seq: s.issued_seq,
            applied_seq: s.applied_seq,
            in_flight: s.in_flight,
        }
    }

    /// Issue a fetch now, outside the regular interval.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop polling. Fetches still in flight complete but are ignored.
    pub fn stop(&self) {
        let mut s = lock(&self.state);
        if s.stopped {
            return;
        }
        s.stopped = true;
        drop(s);
        let _ = self.stop_tx.send(());
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_poll_loop<S: SensorSource>(
    source: Arc<S>,
    settings: Arc<PollSettings>,
    state: SharedState,
    refresh: Arc<Notify>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => issue(&source, &settings, &state),
            _ = refresh.notified() => issue(&source, &settings, &state),
        }
    }

    tracing::info!("Poller: stopped {}", settings.label);
}

fn issue<S: SensorSource>(source: &Arc<S>, settings: &Arc<PollSettings>, state: &SharedState) {
    let seq = {
        let mut s = lock(state);
        if s.stopped {
            return;
        }
        s.issued_seq += 1;
        s.in_flight += 1;
        s.last_attempt = Some(Utc::now());
        s.issued_seq
    };

    let source = source.clone();
    let settings = settings.clone();
    let state = state.clone();

    tokio::spawn(async move {
        let result = match source.fetch().await {
            Ok(records) => pipeline::process(&records, &settings.schema).map_err(FetchError::from),
            Err(e) => Err(e),
        };

        match complete(&state, seq, result) {
            Outcome::Applied { readings, unparsable } => {
                if unparsable > 0 {
                    tracing::warn!(
                        "Poller: {} has {} readings with unparsable timestamps",
                        settings.label,
                        unparsable
                    );
                }
                tracing::debug!("Poller: applied fetch #{} for {} ({} readings)", seq, settings.label, readings);
            }
            Outcome::Failed(e) => {
                tracing::error!("Poller: fetch #{} failed for {}: {}", seq, settings.label, e);
            }
            Outcome::Superseded { latest } => {
                tracing::debug!(
                    "Poller: discarding fetch #{} for {}, #{} is newer",
                    seq,
                    settings.label,
                    latest
                );
            }
            Outcome::Stopped => {}
        }
    });
}

fn complete(state: &Mutex<FeedState>, seq: u64, result: Result<SortedSeries, FetchError>) -> Outcome {
    let mut s = lock(state);
    s.in_flight = s.in_flight.saturating_sub(1);

    if s.stopped {
        return Outcome::Stopped;
    }
    if seq != s.issued_seq {
        return Outcome::Superseded { latest: s.issued_seq };
    }

    match result {
        Ok(series) => {
            let outcome = Outcome::Applied {
                readings: series.readings.len(),
                unparsable: series.unparsable,
            };
            s.series = Some(Arc::new(series));
            s.last_error = None;
            s.last_success = Some(Utc::now());
            s.applied_seq = seq;
            outcome
        }
        Err(e) => {
            s.last_error = Some(e.to_string());
            Outcome::Failed(e)
        }
    }
}
