//! Periodic roughness-event detection over unprocessed telemetry.
//!
//! Each run claims a batch of unprocessed rows ordered by
//! (truck_id, recorded_at), scans every truck's substream with a threshold
//! state machine on |axis_z|, inserts the resulting events, and marks the
//! batch processed. A process-wide advisory lock keeps concurrent service
//! instances from double-processing.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::TelemetryRepository;
use crate::error::RepositoryError;
use crate::metrics::Metrics;
use crate::models::event::{NewRoughnessEvent, Severity, EVENT_TYPE_ROUGHNESS};
use crate::models::telemetry::TruckTelemetry;
use crate::roughness::{classify_mg, Thresholds};

pub const DETECTOR_LOCK: &str = "roadpulse_event_detector";

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub batch_limit: i64,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorOutcome {
    pub scanned: usize,
    pub emitted: usize,
}

pub async fn run_periodic(
    repo: Arc<dyn TelemetryRepository>,
    cfg: DetectorConfig,
    metrics: Arc<Metrics>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = run_once(repo.as_ref(), &cfg, &metrics).await {
            error!(error = %e, "roughness scan failed");
        }
    }
}

pub async fn run_once(
    repo: &dyn TelemetryRepository,
    cfg: &DetectorConfig,
    metrics: &Metrics,
) -> Result<DetectorOutcome, RepositoryError> {
    if !repo.try_advisory_lock(DETECTOR_LOCK).await? {
        debug!("another instance holds the detector lock, skipping run");
        return Ok(DetectorOutcome::default());
    }

    let result = scan_batch(repo, cfg).await;
    if let Err(e) = repo.release_advisory_lock(DETECTOR_LOCK).await {
        error!(error = %e, "failed to release detector lock");
    }

    let outcome = result?;
    if outcome.scanned > 0 {
        Metrics::bump(&metrics.detector_batches);
        info!(
            scanned = outcome.scanned,
            emitted = outcome.emitted,
            "roughness scan complete"
        );
    }
    Ok(outcome)
}

async fn scan_batch(
    repo: &dyn TelemetryRepository,
    cfg: &DetectorConfig,
) -> Result<DetectorOutcome, RepositoryError> {
    let rows = repo.list_unprocessed_telemetry(cfg.batch_limit).await?;
    if rows.is_empty() {
        return Ok(DetectorOutcome::default());
    }

    // Rows arrive sorted by (truck_id, recorded_at); events must never span
    // a truck boundary.
    let mut events = Vec::new();
    for truck_rows in rows.chunk_by(|a, b| a.truck_id == b.truck_id) {
        events.extend(detect_events(truck_rows, &cfg.thresholds));
    }

    if !events.is_empty() {
        repo.insert_roughness_events(&events).await?;
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    repo.mark_telemetry_processed(&ids).await?;

    Ok(DetectorOutcome {
        scanned: rows.len(),
        emitted: events.len(),
    })
}

/// Scan one truck's samples in timestamp order. A sample above the medium
/// threshold opens or extends an event; the first calm sample closes it and
/// bounds its duration. An event still open when the batch ends is emitted
/// with the duration accumulated so far.
pub fn detect_events(samples: &[TruckTelemetry], thresholds: &Thresholds) -> Vec<NewRoughnessEvent> {
    let mut events = Vec::new();
    let mut current: Option<OpenEvent> = None;

    for sample in samples {
        let abs_z = abs_axis(sample.axis_z);
        match classify_mg(abs_z, thresholds) {
            None => {
                if let Some(mut open) = current.take() {
                    open.duration_ms += gap_ms(open.last_at, sample.recorded_at);
                    events.push(open.finish());
                }
            }
            Some(severity) => match current.as_mut() {
                None => current = Some(OpenEvent::from_sample(sample, severity)),
                Some(open) => open.extend(sample, severity),
            },
        }
    }

    if let Some(open) = current {
        events.push(open.finish());
    }
    events
}

struct OpenEvent {
    truck_id: i64,
    started_at: NaiveDateTime,
    last_at: NaiveDateTime,
    duration_ms: i64,
    severity: Severity,
    peak_x: i32,
    peak_y: i32,
    peak_z: i32,
    lat: i32,
    lon: i32,
    segment_id: Option<i64>,
    speed: i32,
    is_loaded: Option<bool>,
}

impl OpenEvent {
    fn from_sample(sample: &TruckTelemetry, severity: Severity) -> Self {
        Self {
            truck_id: sample.truck_id,
            started_at: sample.recorded_at,
            last_at: sample.recorded_at,
            duration_ms: 0,
            severity,
            peak_x: abs_axis(sample.axis_x),
            peak_y: abs_axis(sample.axis_y),
            peak_z: abs_axis(sample.axis_z),
            lat: sample.lat,
            lon: sample.lon,
            segment_id: sample.segment_id,
            speed: sample.speed,
            is_loaded: sample.is_loaded,
        }
    }

    fn extend(&mut self, sample: &TruckTelemetry, severity: Severity) {
        self.duration_ms += gap_ms(self.last_at, sample.recorded_at);
        self.last_at = sample.recorded_at;
        self.peak_x = self.peak_x.max(abs_axis(sample.axis_x));
        self.peak_y = self.peak_y.max(abs_axis(sample.axis_y));
        self.peak_z = self.peak_z.max(abs_axis(sample.axis_z));
        self.severity = self.severity.max(severity);
    }

    fn finish(self) -> NewRoughnessEvent {
        NewRoughnessEvent {
            event_id: Uuid::new_v4(),
            truck_id: self.truck_id,
            started_at: self.started_at,
            duration_ms: self.duration_ms,
            lat: self.lat,
            lon: self.lon,
            segment_id: self.segment_id,
            event_type: EVENT_TYPE_ROUGHNESS,
            severity: self.severity,
            peak_x: self.peak_x,
            peak_y: self.peak_y,
            peak_z: self.peak_z,
            speed: self.speed,
            is_loaded: self.is_loaded,
        }
    }
}

fn abs_axis(value: Option<i16>) -> i32 {
    value.map_or(0, |v| (v as i32).abs())
}

fn gap_ms(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (to - from).num_milliseconds()
}
