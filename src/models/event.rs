use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

pub const EVENT_TYPE_ROUGHNESS: &str = "ROUGHNESS";

/// Ordered so that `max` picks the worst severity seen across an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived roughness event, one per contiguous run of threshold-exceeding
/// vertical-shock samples. Location, speed and load state are taken from
/// the sample that opened the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRoughnessEvent {
    pub event_id: Uuid,
    #[serde(with = "super::id_string")]
    pub truck_id: i64,
    /// Timestamp of the first exceedance.
    pub started_at: NaiveDateTime,
    pub duration_ms: i64,
    pub lat: i32,
    pub lon: i32,
    #[serde(with = "super::opt_id_string")]
    pub segment_id: Option<i64>,
    pub event_type: &'static str,
    pub severity: Severity,
    /// Peak absolute milli-g per axis across the event window.
    pub peak_x: i32,
    pub peak_y: i32,
    pub peak_z: i32,
    pub speed: i32,
    pub is_loaded: Option<bool>,
}
