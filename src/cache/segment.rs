//! Nearest-segment resolution with a coordinate-rounded cache. Keys round
//! to 4 decimal degrees (~11 m cells), so every fix inside a cell shares
//! one spatial query. The cache is bounded with FIFO eviction. Backend
//! failures resolve to `None` and never fail ingestion.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::spatial::SegmentLookup;

type CellKey = (i32, i32);

struct FifoCache {
    map: HashMap<CellKey, Option<i64>>,
    order: VecDeque<CellKey>,
    capacity: usize,
}

impl FifoCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &CellKey) -> Option<Option<i64>> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: CellKey, value: Option<i64>) {
        if self.map.insert(key, value).is_none() {
            self.order.push_back(key);
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
        }
    }
}

pub struct SegmentCache {
    lookup: Arc<dyn SegmentLookup>,
    entries: Mutex<FifoCache>,
    proximity_m: f64,
}

impl SegmentCache {
    pub fn new(lookup: Arc<dyn SegmentLookup>, capacity: usize, proximity_m: f64) -> Self {
        Self {
            lookup,
            entries: Mutex::new(FifoCache::new(capacity)),
            proximity_m,
        }
    }

    pub async fn resolve(&self, lat_deg: f64, lon_deg: f64) -> Option<i64> {
        let key = (round4(lat_deg), round4(lon_deg));
        if let Some(cached) = self.entries.lock().unwrap().get(&key) {
            return cached;
        }

        match self
            .lookup
            .nearest_segment_within(lat_deg, lon_deg, self.proximity_m)
            .await
        {
            Ok(segment) => {
                self.entries.lock().unwrap().insert(key, segment);
                segment
            }
            Err(e) => {
                // Not cached: the backend may recover before the next fix.
                warn!(error = %e, "segment lookup failed, persisting without segment");
                None
            }
        }
    }
}

fn round4(deg: f64) -> i32 {
    (deg * 10_000.0).round() as i32
}
