//! Nearest-road-segment lookup, delegated to the spatial backend.

use async_trait::async_trait;

use crate::db::{queries, DbPool};
use crate::error::SpatialError;

/// Geodesic nearest-segment query. Returns the single closest segment whose
/// geometry lies within `meters` of the point, or `None`.
#[async_trait]
pub trait SegmentLookup: Send + Sync {
    async fn nearest_segment_within(
        &self,
        lat: f64,
        lon: f64,
        meters: f64,
    ) -> Result<Option<i64>, SpatialError>;
}

/// PostGIS-backed implementation over the shared pool.
pub struct PgSegmentLookup {
    pool: DbPool,
}

impl PgSegmentLookup {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SegmentLookup for PgSegmentLookup {
    async fn nearest_segment_within(
        &self,
        lat: f64,
        lon: f64,
        meters: f64,
    ) -> Result<Option<i64>, SpatialError> {
        sqlx::query_scalar::<_, i64>(queries::SELECT_NEAREST_SEGMENT)
            .bind(lat)
            .bind(lon)
            .bind(meters)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SpatialError::BackendUnavailable(e.to_string()))
    }
}
