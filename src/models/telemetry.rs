use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// Persisted telemetry row, minus the raw-record blob (the derivation
/// pipeline never reads it).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct TruckTelemetry {
    #[serde(with = "super::id_string")]
    pub id: i64,
    pub recorded_at: NaiveDateTime,
    #[serde(with = "super::id_string")]
    pub truck_id: i64,
    /// Signed fixed-point, 1e-7 degrees.
    pub lat: i32,
    pub lon: i32,
    pub altitude: i16,
    pub speed: i32,
    pub heading: i32,
    pub satellites: i16,
    /// Milli-g, signed.
    pub axis_x: Option<i16>,
    pub axis_y: Option<i16>,
    pub axis_z: Option<i16>,
    pub ignition: Option<bool>,
    pub movement: Option<bool>,
    pub external_voltage_mv: Option<i32>,
    pub battery_voltage_mv: Option<i32>,
    pub din1: Option<bool>,
    pub din2: Option<bool>,
    pub ain1: Option<i32>,
    pub odometer_m: Option<i64>,
    pub gsm_signal: Option<i16>,
    #[serde(with = "super::opt_id_string")]
    pub segment_id: Option<i64>,
    pub is_loaded: Option<bool>,
    pub processed: bool,
}

/// Insert image of one decoded AVL record. `processed` starts false; the
/// raw decoded structure rides along as a JSON blob for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetry {
    pub truck_id: i64,
    pub recorded_at: NaiveDateTime,
    pub lat: i32,
    pub lon: i32,
    pub altitude: i16,
    pub speed: i32,
    pub heading: i32,
    pub satellites: i16,
    pub axis_x: Option<i16>,
    pub axis_y: Option<i16>,
    pub axis_z: Option<i16>,
    pub ignition: Option<bool>,
    pub movement: Option<bool>,
    pub external_voltage_mv: Option<i32>,
    pub battery_voltage_mv: Option<i32>,
    pub din1: Option<bool>,
    pub din2: Option<bool>,
    pub ain1: Option<i32>,
    pub odometer_m: Option<i64>,
    pub gsm_signal: Option<i16>,
    pub segment_id: Option<i64>,
    pub is_loaded: Option<bool>,
    pub raw_record: Value,
}
