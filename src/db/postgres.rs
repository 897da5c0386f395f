use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::Postgres;
use tokio::sync::Mutex;

use crate::db::{queries, BatchOutcome, DbPool, TelemetryRepository};
use crate::error::RepositoryError;
use crate::models::event::{NewRoughnessEvent, Severity};
use crate::models::stats::{RoadSegmentStats, SegmentSample};
use crate::models::telemetry::{NewTelemetry, TruckTelemetry};
use crate::models::truck::Truck;

pub struct PgRepository {
    pool: DbPool,
    /// Advisory locks are session-scoped: the connection that acquired one
    /// must stay checked out until the matching release.
    lock_conns: Mutex<HashMap<String, PoolConnection<Postgres>>>,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            lock_conns: Mutex::new(HashMap::new()),
        }
    }
}

fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    let end = (day + chrono::Duration::days(1)).and_time(NaiveTime::MIN);
    (start, end)
}

#[async_trait]
impl TelemetryRepository for PgRepository {
    async fn find_truck_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Truck>, RepositoryError> {
        let truck = sqlx::query_as::<_, Truck>(queries::SELECT_TRUCK_BY_IDENTIFIER)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(truck)
    }

    async fn insert_telemetry_batch(
        &self,
        rows: &[NewTelemetry],
    ) -> Result<BatchOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for row in rows {
            let result = sqlx::query(queries::INSERT_TELEMETRY)
                .bind(row.truck_id)
                .bind(row.recorded_at)
                .bind(row.lat)
                .bind(row.lon)
                .bind(row.altitude)
                .bind(row.speed)
                .bind(row.heading)
                .bind(row.satellites)
                .bind(row.axis_x)
                .bind(row.axis_y)
                .bind(row.axis_z)
                .bind(row.ignition)
                .bind(row.movement)
                .bind(row.external_voltage_mv)
                .bind(row.battery_voltage_mv)
                .bind(row.din1)
                .bind(row.din2)
                .bind(row.ain1)
                .bind(row.odometer_m)
                .bind(row.gsm_signal)
                .bind(row.segment_id)
                .bind(row.is_loaded)
                .bind(Json(&row.raw_record))
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(BatchOutcome {
            inserted,
            skipped: rows.len() as u64 - inserted,
        })
    }

    async fn list_unprocessed_telemetry(
        &self,
        limit: i64,
    ) -> Result<Vec<TruckTelemetry>, RepositoryError> {
        let rows = sqlx::query_as::<_, TruckTelemetry>(queries::SELECT_UNPROCESSED_TELEMETRY)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn mark_telemetry_processed(&self, ids: &[i64]) -> Result<(), RepositoryError> {
        sqlx::query(queries::MARK_TELEMETRY_PROCESSED)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_roughness_events(
        &self,
        events: &[NewRoughnessEvent],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query(queries::INSERT_ROUGHNESS_EVENT)
                .bind(event.event_id)
                .bind(event.truck_id)
                .bind(event.started_at)
                .bind(event.duration_ms)
                .bind(event.lat)
                .bind(event.lon)
                .bind(event.segment_id)
                .bind(event.event_type)
                .bind(event.severity.as_str())
                .bind(event.peak_x)
                .bind(event.peak_y)
                .bind(event.peak_z)
                .bind(event.speed)
                .bind(event.is_loaded)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_road_segment_ids(&self) -> Result<Vec<i64>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, i64>(queries::SELECT_ROAD_SEGMENT_IDS)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn list_telemetry_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<SegmentSample>, RepositoryError> {
        let (start, end) = day_bounds(day);
        let samples = sqlx::query_as::<_, SegmentSample>(queries::SELECT_TELEMETRY_FOR_SEGMENT_DAY)
            .bind(segment_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(samples)
    }

    async fn count_events_for_segment_on_day(
        &self,
        segment_id: i64,
        day: NaiveDate,
        severity: Option<Severity>,
    ) -> Result<i64, RepositoryError> {
        let (start, end) = day_bounds(day);
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_EVENTS_FOR_SEGMENT_DAY)
            .bind(segment_id)
            .bind(start)
            .bind(end)
            .bind(severity.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn upsert_segment_stats(&self, row: &RoadSegmentStats) -> Result<(), RepositoryError> {
        sqlx::query(queries::UPSERT_SEGMENT_STATS)
            .bind(row.segment_id)
            .bind(row.stat_date)
            .bind(row.total_passes)
            .bind(row.loaded_passes)
            .bind(row.avg_speed)
            .bind(row.std_dev_z)
            .bind(row.iri_estimate)
            .bind(&row.iri_category)
            .bind(row.event_count)
            .bind(row.critical_event_count)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn try_advisory_lock(&self, name: &str) -> Result<bool, RepositoryError> {
        let mut held = self.lock_conns.lock().await;
        if held.contains_key(name) {
            return Ok(false);
        }
        let mut conn = self.pool.acquire().await?;
        let acquired = sqlx::query_scalar::<_, bool>(queries::TRY_ADVISORY_LOCK)
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        if acquired {
            held.insert(name.to_string(), conn);
        }
        Ok(acquired)
    }

    async fn release_advisory_lock(&self, name: &str) -> Result<(), RepositoryError> {
        let conn = self.lock_conns.lock().await.remove(name);
        if let Some(mut conn) = conn {
            sqlx::query_scalar::<_, bool>(queries::RELEASE_ADVISORY_LOCK)
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
        }
        Ok(())
    }
}
