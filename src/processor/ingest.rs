//! Per-packet ingestion: validate the announcing device, map IO elements,
//! snap fixes to road segments, and batch-persist the rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::cache::device::DeviceCache;
use crate::cache::segment::SegmentCache;
use crate::codec::{AvlPacket, AvlRecord, IoValue};
use crate::db::{BatchOutcome, TelemetryRepository};
use crate::error::IngestError;
use crate::iomap::{self, MappedIo};
use crate::metrics::Metrics;
use crate::models::telemetry::NewTelemetry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub records_processed: u64,
    pub records_skipped: u64,
}

pub struct IngestService {
    repo: Arc<dyn TelemetryRepository>,
    devices: Arc<DeviceCache>,
    segments: Arc<SegmentCache>,
    metrics: Arc<Metrics>,
    /// Max tolerated clock skew for device timestamps ahead of server time.
    timestamp_skew_ms: i64,
}

impl IngestService {
    pub fn new(
        repo: Arc<dyn TelemetryRepository>,
        devices: Arc<DeviceCache>,
        segments: Arc<SegmentCache>,
        metrics: Arc<Metrics>,
        timestamp_skew_ms: i64,
    ) -> Self {
        Self {
            repo,
            devices,
            segments,
            metrics,
            timestamp_skew_ms,
        }
    }

    pub async fn ingest(
        &self,
        packet: &AvlPacket,
        identifier: &str,
    ) -> Result<IngestOutcome, IngestError> {
        let Some(truck) = self.devices.resolve(identifier).await? else {
            Metrics::bump(&self.metrics.unauthorized_packets);
            return Err(IngestError::UnauthorizedDevice(identifier.to_string()));
        };
        if !truck.is_active() {
            // Status is owned by the admin store; telemetry still lands.
            debug!(device = identifier, status = %truck.status, "telemetry from non-active truck");
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut skipped = 0u64;
        let mut rows = Vec::with_capacity(packet.records.len());

        for record in &packet.records {
            if record.timestamp_ms > now_ms + self.timestamp_skew_ms {
                warn!(
                    device = identifier,
                    timestamp_ms = record.timestamp_ms,
                    "record stamped in the future, skipping"
                );
                skipped += 1;
                continue;
            }
            let Some(recorded_at) =
                DateTime::from_timestamp_millis(record.timestamp_ms).map(|dt| dt.naive_utc())
            else {
                warn!(
                    device = identifier,
                    timestamp_ms = record.timestamp_ms,
                    "record timestamp out of range, skipping"
                );
                skipped += 1;
                continue;
            };

            let mapped = iomap::map_elements(&record.elements);
            if !mapped.unknown.is_empty() {
                debug!(
                    device = identifier,
                    count = mapped.unknown.len(),
                    "record carries unmapped io elements"
                );
            }
            let segment_id = self
                .segments
                .resolve(record.gps.lat as f64 / 1e7, record.gps.lon as f64 / 1e7)
                .await;

            rows.push(build_row(truck.id, recorded_at, record, &mapped, segment_id));
        }

        let outcome = if rows.is_empty() {
            BatchOutcome::default()
        } else {
            self.repo.insert_telemetry_batch(&rows).await?
        };

        Metrics::bump(&self.metrics.packets_ingested);
        Metrics::add(&self.metrics.records_inserted, outcome.inserted);
        Metrics::add(&self.metrics.duplicates_skipped, outcome.skipped);

        Ok(IngestOutcome {
            records_processed: outcome.inserted,
            records_skipped: outcome.skipped + skipped,
        })
    }
}

fn build_row(
    truck_id: i64,
    recorded_at: chrono::NaiveDateTime,
    record: &AvlRecord,
    mapped: &MappedIo,
    segment_id: Option<i64>,
) -> NewTelemetry {
    NewTelemetry {
        truck_id,
        recorded_at,
        lat: record.gps.lat,
        lon: record.gps.lon,
        altitude: record.gps.altitude,
        speed: record.gps.speed as i32,
        heading: record.gps.heading as i32,
        satellites: record.gps.satellites as i16,
        axis_x: mapped.axis_x,
        axis_y: mapped.axis_y,
        axis_z: mapped.axis_z,
        ignition: mapped.ignition.map(|v| v != 0),
        movement: mapped.movement.map(|v| v != 0),
        external_voltage_mv: mapped.external_voltage.map(|v| v as i32),
        battery_voltage_mv: mapped.battery_voltage.map(|v| v as i32),
        din1: mapped.din1.map(|v| v != 0),
        din2: mapped.din2.map(|v| v != 0),
        ain1: mapped.ain1.map(|v| v as i32),
        odometer_m: mapped.odometer.map(|v| v as i64),
        gsm_signal: mapped.gsm_signal.map(|v| v as i16),
        segment_id,
        // Load sensing rides on digital input 1 (bed pressure switch).
        is_loaded: mapped.din1.map(|v| v != 0),
        raw_record: raw_record_json(record),
    }
}

/// Structured image of the decoded record, kept for diagnostics.
fn raw_record_json(record: &AvlRecord) -> Value {
    let mut io = Map::new();
    for element in &record.elements {
        let value = match &element.value {
            IoValue::U8(v) => Value::from(*v),
            IoValue::U16(v) => Value::from(*v),
            IoValue::U32(v) => Value::from(*v),
            // 64-bit values surface as strings, like every other wide integer.
            IoValue::U64(v) => Value::from(v.to_string()),
            IoValue::Var(bytes) => Value::from(crate::codec::hex_preview(bytes, bytes.len())),
        };
        io.insert(element.id.to_string(), value);
    }

    json!({
        "timestamp_ms": record.timestamp_ms.to_string(),
        "priority": record.priority,
        "event_io_id": record.event_io_id,
        "gps": {
            "lat": record.gps.lat,
            "lon": record.gps.lon,
            "altitude": record.gps.altitude,
            "heading": record.gps.heading,
            "satellites": record.gps.satellites,
            "speed": record.gps.speed,
        },
        "io": io,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, GpsElement, IoElement};
    use crate::db::memory::{MemoryRepository, MemorySegmentLookup};
    use crate::iomap::{IO_AXIS_Z, IO_DIN1, IO_IGNITION};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const IMEI: &str = "867564050638581";

    fn record(ts_ms: i64, axis_z: i16, din1: u8) -> AvlRecord {
        AvlRecord {
            timestamp_ms: ts_ms,
            priority: 0,
            gps: GpsElement {
                lon: -1_003_841_400,
                lat: 206_052_430,
                altitude: 1820,
                heading: 90,
                satellites: 9,
                speed: 34,
            },
            event_io_id: 0,
            elements: vec![
                IoElement { id: IO_AXIS_Z, value: IoValue::U16(axis_z as u16) },
                IoElement { id: IO_DIN1, value: IoValue::U8(din1) },
                IoElement { id: IO_IGNITION, value: IoValue::U8(1) },
            ],
        }
    }

    fn packet(records: Vec<AvlRecord>) -> AvlPacket {
        AvlPacket {
            codec: Codec::Codec8,
            bytes_consumed: 0,
            records,
        }
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        lookup: Arc<MemorySegmentLookup>,
        metrics: Arc<Metrics>,
        service: IngestService,
    }

    fn fixture(segment: Option<i64>) -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        repo.add_truck(1, IMEI);
        let lookup = Arc::new(MemorySegmentLookup::returning(segment));
        let metrics = Arc::new(Metrics::default());
        let service = IngestService::new(
            repo.clone(),
            Arc::new(DeviceCache::new(
                repo.clone(),
                Duration::from_secs(300),
                Duration::from_secs(30),
                16,
            )),
            Arc::new(SegmentCache::new(lookup.clone(), 100, 50.0)),
            metrics.clone(),
            60_000,
        );
        Fixture { repo, lookup, metrics, service }
    }

    #[tokio::test]
    async fn persists_mapped_records() {
        let f = fixture(Some(5));
        let outcome = f
            .service
            .ingest(&packet(vec![record(1_704_067_200_000, -1050, 1)]), IMEI)
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome { records_processed: 1, records_skipped: 0 });
        let rows = f.repo.telemetry_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].truck_id, 1);
        assert_eq!(rows[0].axis_z, Some(-1050));
        assert_eq!(rows[0].ignition, Some(true));
        assert_eq!(rows[0].is_loaded, Some(true));
        assert_eq!(rows[0].segment_id, Some(5));
        assert!(!rows[0].processed);
    }

    #[tokio::test]
    async fn retransmits_are_deduplicated() {
        let f = fixture(None);
        let pkt = packet(vec![record(1_704_067_200_000, 0, 0)]);

        f.service.ingest(&pkt, IMEI).await.unwrap();
        let second = f.service.ingest(&pkt, IMEI).await.unwrap();

        assert_eq!(second, IngestOutcome { records_processed: 0, records_skipped: 1 });
        assert_eq!(f.repo.telemetry_rows().len(), 1);
        assert_eq!(f.metrics.duplicates_skipped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unknown_identifier_persists_nothing() {
        let f = fixture(None);
        let err = f
            .service
            .ingest(&packet(vec![record(1_704_067_200_000, 0, 0)]), "999999999999999")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UnauthorizedDevice(_)));
        assert!(f.repo.telemetry_rows().is_empty());
        assert_eq!(f.metrics.unauthorized_packets.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn future_stamped_records_are_skipped() {
        let f = fixture(None);
        let ahead = Utc::now().timestamp_millis() + 600_000;
        let outcome = f
            .service
            .ingest(&packet(vec![record(ahead, 0, 0)]), IMEI)
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome { records_processed: 0, records_skipped: 1 });
        assert!(f.repo.telemetry_rows().is_empty());
    }

    #[tokio::test]
    async fn spatial_failure_does_not_fail_ingestion() {
        let f = fixture(Some(5));
        f.lookup.fail.store(true, Ordering::Relaxed);

        let outcome = f
            .service
            .ingest(&packet(vec![record(1_704_067_200_000, 0, 0)]), IMEI)
            .await
            .unwrap();

        assert_eq!(outcome.records_processed, 1);
        assert_eq!(f.repo.telemetry_rows()[0].segment_id, None);
    }

    #[test]
    fn raw_record_blob_is_structured() {
        let blob = raw_record_json(&record(1_704_067_200_000, -1050, 1));
        assert_eq!(blob["timestamp_ms"], "1704067200000");
        assert_eq!(blob["gps"]["lat"], 206_052_430);
        assert_eq!(blob["io"]["19"], (-1050i16 as u16) as i64);
        assert_eq!(blob["io"]["239"], 1);
    }
}
