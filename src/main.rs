mod cache;
mod codec;
mod config;
mod db;
mod error;
mod iomap;
mod metrics;
mod models;
mod processor;
mod roughness;
mod server;
mod spatial;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use cache::device::DeviceCache;
use cache::segment::SegmentCache;
use config::AppConfig;
use db::postgres::PgRepository;
use db::TelemetryRepository;
use metrics::Metrics;
use processor::detector::DetectorConfig;
use processor::ingest::IngestService;
use server::SessionConfig;
use spatial::{PgSegmentLookup, SegmentLookup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting RoadPulse Telemetry Service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");

    let repo: Arc<dyn TelemetryRepository> = Arc::new(PgRepository::new(pool.clone()));
    let lookup: Arc<dyn SegmentLookup> = Arc::new(PgSegmentLookup::new(pool));
    let metrics = Arc::new(Metrics::default());

    let devices = Arc::new(DeviceCache::new(
        repo.clone(),
        Duration::from_millis(config.imei_cache_ttl_ms),
        Duration::from_millis(config.imei_cache_neg_ttl_ms),
        config.imei_cache_max,
    ));
    let segments = Arc::new(SegmentCache::new(
        lookup,
        config.segment_cache_max,
        config.segment_proximity_m,
    ));
    let ingest = Arc::new(IngestService::new(
        repo.clone(),
        devices,
        segments,
        metrics.clone(),
        config.timestamp_skew_ms,
    ));

    // Derivation pipelines and the counter log line run on their own timers.
    tokio::spawn(processor::detector::run_periodic(
        repo.clone(),
        DetectorConfig {
            batch_limit: config.event_batch,
            thresholds: config.thresholds(),
        },
        metrics.clone(),
        Duration::from_millis(config.event_interval_ms),
    ));
    tokio::spawn(processor::aggregator::run_daily(
        repo.clone(),
        config.iri_params(),
        config.aggregate_hour_utc,
    ));
    tokio::spawn(metrics::run_logger(metrics.clone(), Duration::from_secs(60)));

    let listener = TcpListener::bind(("0.0.0.0", config.tcp_port)).await?;
    info!(port = config.tcp_port, "Listening for tracker connections");

    let session_cfg = SessionConfig {
        frame_cap_bytes: config.frame_cap_bytes,
        idle_timeout: Duration::from_millis(config.session_idle_ms),
    };

    tokio::select! {
        result = server::run_server(listener, ingest, metrics, session_cfg, config.ingest_workers) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, closing listener");
            Ok(())
        }
    }
}
