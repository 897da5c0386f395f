use serde::Serialize;
use sqlx::FromRow;

pub const STATUS_ACTIVE: &str = "ACTIVE";

/// Fleet vehicle as registered by the administrative store. Read-only to
/// the ingestion pipeline; `identifier` is the string the device announces
/// on connect and is never reused.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Truck {
    #[serde(with = "super::id_string")]
    pub id: i64,
    pub identifier: String,
    pub status: String, // Enum in DB (ACTIVE/MAINTENANCE/RETIRED), map to String
}

impl Truck {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}
