//! In-memory repository and segment lookup used by the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::{BatchOutcome, TelemetryRepository};
use crate::error::{RepositoryError, SpatialError};
use crate::models::event::{NewRoughnessEvent, Severity};
use crate::models::stats::{RoadSegmentStats, SegmentSample};
use crate::models::telemetry::{NewTelemetry, TruckTelemetry};
use crate::models::truck::Truck;
use crate::spatial::SegmentLookup;

#[derive(Default)]
pub struct MemoryRepository {
    trucks: Mutex<Vec<Truck>>,
    telemetry: Mutex<Vec<TruckTelemetry>>,
    events: Mutex<Vec<NewRoughnessEvent>>,
    segments: Mutex<Vec<i64>>,
    stats: Mutex<HashMap<(i64, NaiveDate), RoadSegmentStats>>,
    locks: Mutex<HashSet<String>>,
    next_id: AtomicI64,
    pub truck_lookups: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_truck(&self, id: i64, identifier: &str) {
        self.trucks.lock().unwrap().push(Truck {
            id,
            identifier: identifier.to_string(),
            status: crate::models::truck::STATUS_ACTIVE.to_string(),
        });
    }

    pub fn add_segment(&self, id: i64) {
        self.segments.lock().unwrap().push(id);
    }

    pub fn telemetry_rows(&self) -> Vec<TruckTelemetry> {
        self.telemetry.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<NewRoughnessEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn stats_rows(&self) -> Vec<RoadSegmentStats> {
        let mut rows: Vec<_> = self.stats.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|r| (r.segment_id, r.stat_date));
        rows
    }

    /// Take a lock out-of-band, as a concurrent process instance would.
    pub fn hold_lock(&self, name: &str) {
        self.locks.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl TelemetryRepository for MemoryRepository {
    async fn find_truck_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Truck>, RepositoryError> {
        self.truck_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .trucks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.identifier == identifier)
            .cloned())
    }

    async fn insert_telemetry_batch(
        &self,
        rows: &[NewTelemetry],
    ) -> Result<BatchOutcome, RepositoryError> {
        let mut stored = self.telemetry.lock().unwrap();
        let mut outcome = BatchOutcome::default();
        for row in rows {
            let duplicate = stored
                .iter()
                .any(|t| t.truck_id == row.truck_id && t.recorded_at == row.recorded_at);
            if duplicate {
                outcome.skipped += 1;
                continue;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            stored.push(TruckTelemetry {
                id,
                recorded_at: row.recorded_at,
                truck_id: row.truck_id,
                lat: row.lat,
                lon: row.lon,
                altitude: row.altitude,
                speed: row.speed,
                heading: row.heading,
                satellites: row.satellites,
                axis_x: row.axis_x,
                axis_y: row.axis_y,
                axis_z: row.axis_z,
                ignition: row.ignition,
                movement: row.movement,
                external_voltage_mv: row.external_voltage_mv,
                battery_voltage_mv: row.battery_voltage_mv,
                din1: row.din1,
                din2: row.din2,
                ain1: row.ain1,
                odometer_m: row.odometer_m,
                gsm_signal: row.gsm_signal,
                segment_id: row.segment_id,
                is_loaded: row.is_loaded,
                processed: false,
            });
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn list_unprocessed_telemetry(
        &self,
        limit: i64,
    ) -> Result<Vec<TruckTelemetry>, RepositoryError> {
        let stored = self.telemetry.lock().unwrap();
        let mut rows: Vec<_> = stored.iter().filter(|t| !t.processed).cloned().collect();
        rows.sort_by_key(|t| (t.truck_id, t.recorded_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn mark_telemetry_processed(&self, ids: &[i64]) -> Result<(), RepositoryError> {
        let mut stored = self.telemetry.lock().unwrap();
        for row in stored.iter_mut() {
            if ids.contains(&row.id) {
                row.processed = true;
            }
        }
        Ok(())
    }

    async fn insert_roughness_events(
        &self,
        events: &[NewRoughnessEvent],
    ) -> Result<(), RepositoryError> {
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }

    async fn list_road_segment_ids(&self) -> Result<Vec<i64>, RepositoryError> {
        Ok(self.segments.lock().unwrap().clone())
    }

    async fn list_telemetry_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<SegmentSample>, RepositoryError> {
        Ok(self
            .telemetry
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.segment_id == Some(segment_id) && t.recorded_at.date() == day)
            .map(|t| SegmentSample {
                axis_z: t.axis_z,
                speed: t.speed,
                is_loaded: t.is_loaded,
            })
            .collect())
    }

    async fn count_events_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
        severity: Option<Severity>,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.segment_id == Some(segment_id)
                    && e.started_at.date() == day
                    && severity.map_or(true, |s| e.severity == s)
            })
            .count() as i64)
    }

    async fn upsert_segment_stats(&self, row: &RoadSegmentStats) -> Result<(), RepositoryError> {
        self.stats
            .lock()
            .unwrap()
            .insert((row.segment_id, row.stat_date), row.clone());
        Ok(())
    }

    async fn try_advisory_lock(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.locks.lock().unwrap().insert(name.to_string()))
    }

    async fn release_advisory_lock(&self, name: &str) -> Result<(), RepositoryError> {
        self.locks.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Insert image with sensible defaults for seeding telemetry in tests.
pub fn seed_row(
    truck_id: i64,
    recorded_at: chrono::NaiveDateTime,
    axis_z: Option<i16>,
    segment_id: Option<i64>,
    speed: i32,
    is_loaded: Option<bool>,
) -> NewTelemetry {
    NewTelemetry {
        truck_id,
        recorded_at,
        lat: 206_052_430,
        lon: -1_003_841_400,
        altitude: 1820,
        speed,
        heading: 90,
        satellites: 9,
        axis_x: Some(20),
        axis_y: Some(-35),
        axis_z,
        ignition: Some(true),
        movement: Some(true),
        external_voltage_mv: Some(27_400),
        battery_voltage_mv: Some(4_012),
        din1: is_loaded,
        din2: None,
        ain1: None,
        odometer_m: Some(121_800),
        gsm_signal: Some(4),
        segment_id,
        is_loaded,
        raw_record: serde_json::json!({}),
    }
}

/// Segment lookup stub: one segment id for every coordinate, optional
/// forced failure, call counting for cache assertions.
#[derive(Default)]
pub struct MemorySegmentLookup {
    pub segment: Option<i64>,
    pub fail: AtomicBool,
    pub calls: AtomicU64,
}

impl MemorySegmentLookup {
    pub fn returning(segment: Option<i64>) -> Self {
        Self {
            segment,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SegmentLookup for MemorySegmentLookup {
    async fn nearest_segment_within(
        &self,
        _lat: f64,
        _lon: f64,
        _meters: f64,
    ) -> Result<Option<i64>, SpatialError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(SpatialError::BackendUnavailable("stub failure".to_string()));
        }
        Ok(self.segment)
    }
}
