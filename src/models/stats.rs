use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// Daily rollup for one road segment. Unique on (segment_id, stat_date);
/// recomputation overwrites, so the row is safe to rebuild at any time.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct RoadSegmentStats {
    #[serde(with = "super::id_string")]
    pub segment_id: i64,
    pub stat_date: NaiveDate,
    pub total_passes: i64,
    pub loaded_passes: i64,
    pub avg_speed: f64,
    pub std_dev_z: f64,
    pub iri_estimate: f64,
    pub iri_category: String,
    pub event_count: i64,
    pub critical_event_count: i64,
}

/// Per-sample projection used by the aggregator: only the columns the daily
/// rollup reads.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct SegmentSample {
    pub axis_z: Option<i16>,
    pub speed: i32,
    pub is_loaded: Option<bool>,
}
