use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::error::RepositoryError;
use crate::models::event::{NewRoughnessEvent, Severity};
use crate::models::stats::{RoadSegmentStats, SegmentSample};
use crate::models::telemetry::{NewTelemetry, TruckTelemetry};
use crate::models::truck::Truck;

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

/// Narrow persistence interface consumed by the ingestion and derivation
/// pipelines. The Postgres implementation lives in [`postgres`]; tests run
/// against the in-memory one.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn find_truck_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Truck>, RepositoryError>;

    /// Insert a packet's rows with skip-duplicates semantics on
    /// (truck_id, recorded_at). Partial success is reported, not an error.
    async fn insert_telemetry_batch(
        &self,
        rows: &[NewTelemetry],
    ) -> Result<BatchOutcome, RepositoryError>;

    /// Unprocessed rows, ordered by (truck_id, recorded_at).
    async fn list_unprocessed_telemetry(
        &self,
        limit: i64,
    ) -> Result<Vec<TruckTelemetry>, RepositoryError>;

    async fn mark_telemetry_processed(&self, ids: &[i64]) -> Result<(), RepositoryError>;

    async fn insert_roughness_events(
        &self,
        events: &[NewRoughnessEvent],
    ) -> Result<(), RepositoryError>;

    async fn list_road_segment_ids(&self) -> Result<Vec<i64>, RepositoryError>;

    async fn list_telemetry_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<SegmentSample>, RepositoryError>;

    async fn count_events_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
        severity: Option<Severity>,
    ) -> Result<i64, RepositoryError>;

    async fn upsert_segment_stats(&self, row: &RoadSegmentStats) -> Result<(), RepositoryError>;

    /// Named, non-blocking advisory lock serializing the derivation tasks.
    async fn try_advisory_lock(&self, name: &str) -> Result<bool, RepositoryError>;

    async fn release_advisory_lock(&self, name: &str) -> Result<(), RepositoryError>;
}
