pub const SELECT_TRUCK_BY_IDENTIFIER: &str = r#"
SELECT id, identifier, status FROM trucks WHERE identifier = $1;
"#;

pub const INSERT_TELEMETRY: &str = r#"
INSERT INTO truck_telemetry (
    truck_id, recorded_at, lat, lon, altitude, speed, heading, satellites,
    axis_x, axis_y, axis_z, ignition, movement,
    external_voltage_mv, battery_voltage_mv, din1, din2, ain1,
    odometer_m, gsm_signal, segment_id, is_loaded, raw_record, processed
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8,
    $9, $10, $11, $12, $13,
    $14, $15, $16, $17, $18,
    $19, $20, $21, $22, $23, false
)
ON CONFLICT (truck_id, recorded_at) DO NOTHING;
"#;

pub const SELECT_UNPROCESSED_TELEMETRY: &str = r#"
SELECT id, recorded_at, truck_id, lat, lon, altitude, speed, heading, satellites,
       axis_x, axis_y, axis_z, ignition, movement,
       external_voltage_mv, battery_voltage_mv, din1, din2, ain1,
       odometer_m, gsm_signal, segment_id, is_loaded, processed
FROM truck_telemetry
WHERE processed = false
ORDER BY truck_id, recorded_at
LIMIT $1;
"#;

pub const MARK_TELEMETRY_PROCESSED: &str = r#"
UPDATE truck_telemetry SET processed = true WHERE id = ANY($1);
"#;

pub const INSERT_ROUGHNESS_EVENT: &str = r#"
INSERT INTO roughness_events (
    event_id, truck_id, started_at, duration_ms, lat, lon, segment_id,
    event_type, severity, peak_x, peak_y, peak_z, speed, is_loaded
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);
"#;

pub const SELECT_ROAD_SEGMENT_IDS: &str = r#"
SELECT id FROM road_segments ORDER BY id;
"#;

pub const SELECT_TELEMETRY_FOR_SEGMENT_DAY: &str = r#"
SELECT axis_z, speed, is_loaded
FROM truck_telemetry
WHERE segment_id = $1 AND recorded_at >= $2 AND recorded_at < $3;
"#;

pub const COUNT_EVENTS_FOR_SEGMENT_DAY: &str = r#"
SELECT COUNT(*)
FROM roughness_events
WHERE segment_id = $1
  AND started_at >= $2 AND started_at < $3
  AND ($4::text IS NULL OR severity = $4);
"#;

pub const UPSERT_SEGMENT_STATS: &str = r#"
INSERT INTO road_segment_stats (
    segment_id, stat_date, total_passes, loaded_passes, avg_speed,
    std_dev_z, iri_estimate, iri_category, event_count, critical_event_count
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (segment_id, stat_date) DO UPDATE
SET total_passes = EXCLUDED.total_passes,
    loaded_passes = EXCLUDED.loaded_passes,
    avg_speed = EXCLUDED.avg_speed,
    std_dev_z = EXCLUDED.std_dev_z,
    iri_estimate = EXCLUDED.iri_estimate,
    iri_category = EXCLUDED.iri_category,
    event_count = EXCLUDED.event_count,
    critical_event_count = EXCLUDED.critical_event_count;
"#;

pub const TRY_ADVISORY_LOCK: &str = r#"
SELECT pg_try_advisory_lock(hashtext($1));
"#;

pub const RELEASE_ADVISORY_LOCK: &str = r#"
SELECT pg_advisory_unlock(hashtext($1));
"#;

pub const SELECT_NEAREST_SEGMENT: &str = r#"
SELECT id
FROM road_segments
WHERE ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3)
ORDER BY ST_Distance(geom::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography)
LIMIT 1;
"#;
