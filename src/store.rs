// Catalog store: shared, read-only catalogs per itinerary.
// Each booking attempt opens its own selection session over the same Arc.

use crate::catalog::Catalog;
use crate::client::{ApiError, BookingBackend};
use crate::config::{CatalogStoreConfig, EngineConfig};
use crate::selection::SelectionStateMachine;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct StoreStats {
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    expired_count: AtomicUsize,
    eviction_count: AtomicUsize,
    replaced_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub eviction_count: usize,
    pub replaced_count: usize,
}

#[derive(Debug)]
struct StoredCatalog {
    catalog: Arc<Catalog>,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredCatalog {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

#[derive(Debug)]
pub struct CatalogStore {
    catalogs: DashMap<String, StoredCatalog>,
    config: CatalogStoreConfig,
    engine: EngineConfig,
    stats: StoreStats,
}

impl CatalogStore {
    pub fn new(config: CatalogStoreConfig, engine: EngineConfig) -> Self {
        Self {
            catalogs: DashMap::new(),
            config,
            engine,
            stats: StoreStats::default(),
        }
    }

    // Sessions opened on a replaced catalog keep using it
    pub fn insert(
        &self,
        itinerary_id: &str,
        catalog: Catalog,
        ttl: Option<Duration>,
    ) -> Arc<Catalog> {
        let ttl = ttl.unwrap_or_else(|| Duration::from_secs(self.config.default_ttl_seconds));
        let catalog = Arc::new(catalog);

        if !self.catalogs.contains_key(itinerary_id)
            && self.catalogs.len() >= self.config.max_catalogs
        {
            self.evict_oldest();
        }

        let previous = self.catalogs.insert(
            itinerary_id.to_string(),
            StoredCatalog {
                catalog: Arc::clone(&catalog),
                stored_at: Instant::now(),
                ttl,
            },
        );
        if previous.is_some() {
            self.stats.replaced_count.fetch_add(1, Ordering::SeqCst);
            info!(itinerary_id, "catalog replaced");
        } else {
            debug!(itinerary_id, ttl_ms = (ttl.as_millis() as u64), "catalog stored");
        }

        catalog
    }

    pub fn get(&self, itinerary_id: &str) -> Option<Arc<Catalog>> {
        let expired = match self.catalogs.get(itinerary_id) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return Some(Arc::clone(&entry.catalog));
            }
            Some(_) => true,
            None => false,
        };

        // The read guard is released before removing
        if expired
            && self
                .catalogs
                .remove_if(itinerary_id, |_, entry| entry.is_expired())
                .is_some()
        {
            self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
            debug!(itinerary_id, "catalog expired");
        }
        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        None
    }

    pub fn open_session(&self, itinerary_id: &str) -> Option<SelectionStateMachine> {
        self.get(itinerary_id)
            .map(|catalog| SelectionStateMachine::with_config(catalog, &self.engine))
    }

    // Stored catalog, or one fetched from the backend and stored
    pub async fn load<B>(&self, backend: &B, itinerary_id: &str) -> Result<Arc<Catalog>, ApiError>
    where
        B: BookingBackend + ?Sized,
    {
        if let Some(catalog) = self.get(itinerary_id) {
            return Ok(catalog);
        }
        let catalog = backend.fetch_catalog(itinerary_id).await?;
        Ok(self.insert(itinerary_id, catalog, None))
    }

    pub fn invalidate(&self, itinerary_id: &str) -> bool {
        self.catalogs.remove(itinerary_id).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.catalogs.len();
        self.catalogs.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(self.catalogs.len());
        self.stats.expired_count.fetch_add(purged, Ordering::SeqCst);
        purged
    }

    pub fn stats(&self) -> StoreStatsReport {
        StoreStatsReport {
            items_count: self.catalogs.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            eviction_count: self.stats.eviction_count.load(Ordering::SeqCst),
            replaced_count: self.stats.replaced_count.load(Ordering::SeqCst),
        }
    }

    fn evict_oldest(&self) {
        let oldest_key = self
            .catalogs
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());

        if let Some(oldest_key) = oldest_key {
            if self.catalogs.remove(&oldest_key).is_some() {
                self.stats.eviction_count.fetch_add(1, Ordering::SeqCst);
                debug!(itinerary_id = %oldest_key, "evicted oldest catalog");
            }
        }
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new(CatalogStoreConfig::default(), EngineConfig::default())
    }
}
