//! Daily per-segment statistics rollup.
//!
//! Once a day the aggregator recomputes, for every road segment with
//! traffic on the prior UTC day, the pass counts, speed and vertical-axis
//! spread, the IRI estimate, and the event tallies, then upserts the row
//! keyed by (segment_id, stat_date). The whole computation is idempotent:
//! re-running a day rewrites the same row.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, error, info};

use crate::db::TelemetryRepository;
use crate::error::RepositoryError;
use crate::models::event::Severity;
use crate::models::stats::RoadSegmentStats;
use crate::roughness::{estimate_iri, std_dev, IriParams};

pub const AGGREGATOR_LOCK: &str = "roadpulse_segment_stats";

pub async fn run_daily(repo: Arc<dyn TelemetryRepository>, params: IriParams, hour_utc: u32) {
    loop {
        tokio::time::sleep(until_next_run(hour_utc)).await;
        let Some(day) = Utc::now().date_naive().pred_opt() else {
            continue;
        };
        match aggregate_day(repo.as_ref(), &params, day).await {
            Ok(written) => info!(%day, segments = written, "daily segment stats written"),
            Err(e) => error!(%day, error = %e, "segment stats aggregation failed"),
        }
    }
}

fn until_next_run(hour_utc: u32) -> Duration {
    let now = Utc::now();
    let tick = NaiveTime::from_hms_opt(hour_utc.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date_naive().and_time(tick).and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(3600))
}

pub async fn aggregate_day(
    repo: &dyn TelemetryRepository,
    params: &IriParams,
    day: NaiveDate,
) -> Result<u64, RepositoryError> {
    if !repo.try_advisory_lock(AGGREGATOR_LOCK).await? {
        debug!("another instance holds the aggregator lock, skipping run");
        return Ok(0);
    }

    let result = aggregate_locked(repo, params, day).await;
    if let Err(e) = repo.release_advisory_lock(AGGREGATOR_LOCK).await {
        error!(error = %e, "failed to release aggregator lock");
    }
    result
}

async fn aggregate_locked(
    repo: &dyn TelemetryRepository,
    params: &IriParams,
    day: NaiveDate,
) -> Result<u64, RepositoryError> {
    let mut written = 0u64;

    for segment_id in repo.list_road_segment_ids().await? {
        let samples = repo
            .list_telemetry_for_segment_on_day(segment_id, day)
            .await?;
        if samples.is_empty() {
            continue;
        }

        let total_passes = samples.len() as i64;
        let loaded_passes = samples
            .iter()
            .filter(|s| s.is_loaded == Some(true))
            .count() as i64;
        let avg_speed = samples.iter().map(|s| s.speed as f64).sum::<f64>() / samples.len() as f64;
        let zs: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.axis_z.map(|z| z as f64))
            .collect();
        let std_dev_z = std_dev(&zs);
        let iri = estimate_iri(&zs, avg_speed, params);

        let event_count = repo
            .count_events_for_segment_on_day(segment_id, day, None)
            .await?;
        let critical_event_count = repo
            .count_events_for_segment_on_day(segment_id, day, Some(Severity::Critical))
            .await?;

        repo.upsert_segment_stats(&RoadSegmentStats {
            segment_id,
            stat_date: day,
            total_passes,
            loaded_passes,
            avg_speed,
            std_dev_z,
            iri_estimate: iri.iri,
            iri_category: iri.category.to_string(),
            event_count,
            critical_event_count,
        })
        .await?;
        written += 1;
    }

    Ok(written)
}
