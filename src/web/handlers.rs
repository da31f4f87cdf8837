//! HTTP request handlers.

use super::AppState;
use crate::pipeline::{
    count_missing, filter, latest_value, mean, period_over_period, rollup, sample_over_sample, select_bucket_seconds, summarize, view,
    Bucket, MetricSummary, SensorReading, SortedSeries, TrendResult, WindowSpec, ZoneKind,
};
use crate::scheduler::{FeedKey, FeedSnapshot, FetchPhase};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Shared types
// ============================================================================

/// What a consumer should render: data, an empty state, or an error banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    Ok,
    Empty,
    Error,
}

impl ViewState {
    fn of(snapshot: &FeedSnapshot, is_empty: bool) -> Self {
        if snapshot.last_error.is_some() {
            ViewState::Error
        } else if is_empty {
            ViewState::Empty
        } else {
            ViewState::Ok
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedStatus {
    pub greenhouse: String,
    pub zone: ZoneKind,
    pub state: ViewState,
    pub phase: FetchPhase,
    pub error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl FeedStatus {
    fn new(key: &FeedKey, snapshot: &FeedSnapshot, is_empty: bool) -> Self {
        Self {
            greenhouse: key.greenhouse.clone(),
            zone: key.zone,
            state: ViewState::of(snapshot, is_empty),
            phase: snapshot.phase,
            error: snapshot.last_error.clone(),
            last_success: snapshot.last_success,
            last_attempt: snapshot.last_attempt,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub bucket: Option<i64>,
}

impl WindowQuery {
    fn spec(&self) -> Result<Option<WindowSpec>, Response> {
        WindowSpec::from_query(self.window.as_deref(), self.start.as_deref(), self.end.as_deref())
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
    }
}

async fn lookup(state: &AppState, greenhouse: String, zone: String) -> Result<(FeedKey, FeedSnapshot), Response> {
    let not_found = || (StatusCode::NOT_FOUND, "Feed not found").into_response();

    let zone: ZoneKind = zone.parse().map_err(|_| not_found())?;
    let key = FeedKey::new(greenhouse, zone);

    match state.scheduler.snapshot(&key).await {
        Some(snapshot) => Ok((key, snapshot)),
        None => Err(not_found()),
    }
}

fn series_of(snapshot: &FeedSnapshot) -> Arc<SortedSeries> {
    snapshot.series.clone().unwrap_or_default()
}

// ============================================================================
// API: Feeds
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FeedSummary {
    #[serde(flatten)]
    pub status: FeedStatus,
    pub metrics: Vec<String>,
    pub readings: usize,
    pub unparsable: usize,
}

pub async fn handle_get_feeds(State(state): State<AppState>) -> impl IntoResponse {
    let feeds: Vec<FeedSummary> = state
        .scheduler
        .feeds()
        .await
        .into_iter()
        .map(|(key, snapshot)| {
            let (readings, unparsable) = snapshot
                .series
                .as_ref()
                .map(|s| (s.readings.len(), s.unparsable))
                .unwrap_or((0, 0));
            FeedSummary {
                status: FeedStatus::new(&key, &snapshot, readings == 0),
                metrics: snapshot.metrics.clone(),
                readings,
                unparsable,
            }
        })
        .collect();

    Json(feeds)
}

pub async fn handle_add_feed(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
) -> impl IntoResponse {
    let zone: ZoneKind = match zone.parse() {
        Ok(z) => z,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };
    let key = FeedKey::new(greenhouse, zone);

    match state.scheduler.add_http_feed(&state.config, key).await {
        Ok(true) => StatusCode::CREATED.into_response(),
        Ok(false) => StatusCode::OK.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_remove_feed(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = match lookup(&state, greenhouse, zone).await {
        Ok((key, _)) => key,
        Err(resp) => return resp,
    };

    state.scheduler.remove_feed(&key).await;
    StatusCode::NO_CONTENT.into_response()
}

pub async fn handle_refresh(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = match lookup(&state, greenhouse, zone).await {
        Ok((key, _)) => key,
        Err(resp) => return resp,
    };

    state.scheduler.refresh(&key).await;
    StatusCode::ACCEPTED.into_response()
}

// ============================================================================
// API: Series
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    #[serde(flatten)]
    pub status: FeedStatus,
    pub window: Option<String>,
    pub unparsable: usize,
    pub readings: Vec<SensorReading>,
}

pub async fn handle_get_series(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> impl IntoResponse {
    let (key, snapshot) = match lookup(&state, greenhouse, zone).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let spec = match query.spec() {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };

    let series = series_of(&snapshot);
    let series_view = view(&series, spec.as_ref(), Utc::now());

    Json(SeriesResponse {
        status: FeedStatus::new(&key, &snapshot, series_view.is_empty()),
        window: series_view.window,
        unparsable: series_view.unparsable,
        readings: series_view.readings,
    })
    .into_response()
}

// ============================================================================
// API: Statistics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MetricStats {
    pub metric: String,
    /// Most recent sample, regardless of window.
    pub latest: Option<f64>,
    pub sample_trend: TrendResult,
    pub average: Option<f64>,
    /// Readings in the window without a usable value.
    pub missing: usize,
    /// Only present when a window was requested.
    pub period_trend: Option<TrendResult>,
    pub summary: Option<MetricSummary>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub status: FeedStatus,
    pub window: Option<String>,
    pub samples: usize,
    pub metrics: Vec<MetricStats>,
}

pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> impl IntoResponse {
    let (key, snapshot) = match lookup(&state, greenhouse, zone).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let spec = match query.spec() {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };

    let now = Utc::now();
    let series = series_of(&snapshot);
    let timed = series.timed();
    // readings without a valid timestamp never count towards aggregates
    let selected = match &spec {
        Some(s) => filter(timed, s, now),
        None => timed.to_vec(),
    };
    let subset = selected.as_slice();

    let metrics = snapshot
        .metrics
        .iter()
        .map(|metric| MetricStats {
            metric: metric.clone(),
            latest: latest_value(timed, metric),
            sample_trend: sample_over_sample(timed, metric),
            average: mean(subset, metric),
            missing: count_missing(subset, metric),
            period_trend: spec.as_ref().map(|s| period_over_period(timed, metric, s, now)),
            summary: summarize(subset, metric),
        })
        .collect();

    Json(StatsResponse {
        status: FeedStatus::new(&key, &snapshot, subset.is_empty()),
        window: spec.as_ref().map(WindowSpec::describe),
        samples: subset.len(),
        metrics,
    })
    .into_response()
}

// ============================================================================
// API: Rollups
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RollupResponse {
    #[serde(flatten)]
    pub status: FeedStatus,
    pub window: Option<String>,
    pub bucket_seconds: i64,
    pub buckets: Vec<Bucket>,
}

pub async fn handle_get_rollup(
    State(state): State<AppState>,
    Path((greenhouse, zone)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> impl IntoResponse {
    let (key, snapshot) = match lookup(&state, greenhouse, zone).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let spec = match query.spec() {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    if matches!(query.bucket, Some(b) if b <= 0) {
        return (StatusCode::BAD_REQUEST, "bucket must be positive").into_response();
    }

    let series = series_of(&snapshot);
    let windowed = view(&series, spec.as_ref(), Utc::now());

    let bucket_seconds = query.bucket.unwrap_or_else(|| {
        let span = match &spec {
            Some(s) => s.span().num_seconds(),
            None => data_span_secs(series.timed()),
        };
        select_bucket_seconds(span)
    });

    let buckets = rollup(&windowed.readings, bucket_seconds, &snapshot.metrics);

    Json(RollupResponse {
        status: FeedStatus::new(&key, &snapshot, buckets.is_empty()),
        window: windowed.window,
        bucket_seconds,
        buckets,
    })
    .into_response()
}

fn data_span_secs(timed: &[SensorReading]) -> i64 {
    match (timed.first().and_then(|r| r.time), timed.last().and_then(|r| r.time)) {
        (Some(first), Some(last)) => (last - first).num_seconds(),
        _ => 0,
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
