use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::roughness::{IriParams, Thresholds};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tcp_port: u16,
    pub frame_cap_bytes: usize,
    pub session_idle_ms: u64,
    pub ingest_workers: usize,
    pub timestamp_skew_ms: i64,
    pub imei_cache_ttl_ms: u64,
    pub imei_cache_neg_ttl_ms: u64,
    pub imei_cache_max: usize,
    pub segment_cache_max: usize,
    pub segment_proximity_m: f64,
    pub roughness_medium_mg: i32,
    pub roughness_high_mg: i32,
    pub roughness_critical_mg: i32,
    pub iri_good: f64,
    pub iri_fair: f64,
    pub iri_poor: f64,
    pub iri_k: f64,
    pub iri_speed_baseline_kmh: f64,
    pub event_batch: i64,
    pub event_interval_ms: u64,
    pub aggregate_hour_utc: u32,
    pub db_max_connections: u32,
    pub database_url: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "roadpulse".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "roadpulse".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "roadpulse".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            tcp_port: env_or("TCP_PORT", 5027),
            frame_cap_bytes: env_or("FRAME_CAP_BYTES", 1_048_576),
            session_idle_ms: env_or("SESSION_IDLE_MS", 300_000),
            ingest_workers: env_or("INGEST_WORKERS", 16),
            timestamp_skew_ms: env_or("TIMESTAMP_SKEW_MS", 60_000),
            imei_cache_ttl_ms: env_or("IMEI_CACHE_TTL_MS", 300_000),
            imei_cache_neg_ttl_ms: env_or("IMEI_CACHE_NEG_TTL_MS", 30_000),
            imei_cache_max: env_or("IMEI_CACHE_MAX", 10_000),
            segment_cache_max: env_or("SEGMENT_CACHE_MAX", 1000),
            segment_proximity_m: env_or("SEGMENT_PROXIMITY_M", 50.0),
            roughness_medium_mg: env_or("ROUGHNESS_MEDIUM_MG", 2000),
            roughness_high_mg: env_or("ROUGHNESS_HIGH_MG", 2500),
            roughness_critical_mg: env_or("ROUGHNESS_CRITICAL_MG", 3500),
            iri_good: env_or("IRI_GOOD", 2.5),
            iri_fair: env_or("IRI_FAIR", 4.0),
            iri_poor: env_or("IRI_POOR", 6.0),
            iri_k: env_or("IRI_K", 15.0),
            iri_speed_baseline_kmh: env_or("IRI_SPEED_BASELINE_KMH", 30.0),
            event_batch: env_or("EVENT_BATCH", 1000),
            event_interval_ms: env_or("EVENT_INTERVAL_MS", 900_000),
            aggregate_hour_utc: env_or("AGGREGATE_HOUR_UTC", 2),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 50),
            database_url,
            log_level,
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            medium_mg: self.roughness_medium_mg,
            high_mg: self.roughness_high_mg,
            critical_mg: self.roughness_critical_mg,
        }
    }

    pub fn iri_params(&self) -> IriParams {
        IriParams {
            k: self.iri_k,
            speed_baseline_kmh: self.iri_speed_baseline_kmh,
            good: self.iri_good,
            fair: self.iri_fair,
            poor: self.iri_poor,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
