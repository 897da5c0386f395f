//! Identifier → truck resolution with a bounded, TTL'd cache in front of
//! the repository. Misses hit the repository exactly once per TTL window;
//! negative results are cached on a shorter TTL so a rogue identifier
//! cannot hot-loop the database.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::db::TelemetryRepository;
use crate::error::RepositoryError;
use crate::models::truck::Truck;

struct CachedTruck {
    truck: Option<Truck>,
    cached_at: Instant,
}

pub struct DeviceCache {
    repo: Arc<dyn TelemetryRepository>,
    entries: Mutex<LruCache<String, CachedTruck>>,
    ttl: Duration,
    negative_ttl: Duration,
}

impl DeviceCache {
    pub fn new(
        repo: Arc<dyn TelemetryRepository>,
        ttl: Duration,
        negative_ttl: Duration,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            repo,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            negative_ttl,
        }
    }

    pub async fn resolve(&self, identifier: &str) -> Result<Option<Truck>, RepositoryError> {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(identifier) {
                let ttl = if entry.truck.is_some() {
                    self.ttl
                } else {
                    self.negative_ttl
                };
                if entry.cached_at.elapsed() < ttl {
                    return Ok(entry.truck.clone());
                }
                entries.pop(identifier);
            }
        }

        // Lock dropped across the repository call; a concurrent duplicate
        // lookup is harmless.
        let truck = self.repo.find_truck_by_identifier(identifier).await?;
        self.entries.lock().unwrap().put(
            identifier.to_string(),
            CachedTruck {
                truck: truck.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(truck)
    }
}
