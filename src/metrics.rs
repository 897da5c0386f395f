//! Operational counters for the ingestion and derivation pipelines,
//! surfaced as a periodic structured log line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

#[derive(Debug, Default)]
pub struct Metrics {
    pub packets_ingested: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub records_inserted: AtomicU64,
    pub duplicates_skipped: AtomicU64,
    pub unauthorized_packets: AtomicU64,
    pub detector_batches: AtomicU64,
}

impl Metrics {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> [u64; 6] {
        [
            self.packets_ingested.load(Ordering::Relaxed),
            self.packets_dropped.load(Ordering::Relaxed),
            self.records_inserted.load(Ordering::Relaxed),
            self.duplicates_skipped.load(Ordering::Relaxed),
            self.unauthorized_packets.load(Ordering::Relaxed),
            self.detector_batches.load(Ordering::Relaxed),
        ]
    }
}

pub async fn run_logger(metrics: Arc<Metrics>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // the zeroth tick fires immediately
    loop {
        ticker.tick().await;
        let [ingested, dropped, inserted, duplicates, unauthorized, batches] = metrics.snapshot();
        info!(
            packets_ingested = ingested,
            packets_dropped = dropped,
            records_inserted = inserted,
            duplicates_skipped = duplicates,
            unauthorized_packets = unauthorized,
            detector_batches = batches,
            "pipeline counters"
        );
    }
}
