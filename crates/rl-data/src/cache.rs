use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

/// Cached close series with fetch metadata
#[derive(Debug, Clone)]
struct CacheEntry {
    closes: Vec<f64>,
    fetched_at: DateTime<Utc>,
    access_count: u64,
}

impl CacheEntry {
    fn new(closes: Vec<f64>) -> Self {
        Self {
            closes,
            fetched_at: Utc::now(),
            access_count: 0,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.fetched_at <= ttl
    }
}

/// In-memory TTL cache for fetched price history.
///
/// Freshness is a provider-layer policy: entries expire on read after the
/// configured TTL and the next fetch goes back to the source. Empty series
/// are cached too, so a symbol known to have no history is not re-fetched
/// on every request.
#[derive(Debug)]
pub struct PriceCache {
    entries: DashMap<String, RwLock<CacheEntry>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl PriceCache {
    /// Cache with a 15-minute default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(15))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Vec<f64>> {
        if let Some(entry_lock) = self.entries.get(symbol) {
            let mut entry = entry_lock.write();
            if entry.is_fresh(self.ttl) {
                entry.access_count += 1;
                self.stats.write().hits += 1;
                return Some(entry.closes.clone());
            }
        }

        // Expired entries are dropped so the map does not accumulate stale series.
        if self.entries.remove(symbol).is_some() {
            self.stats.write().expirations += 1;
        }

        self.stats.write().misses += 1;
        None
    }

    pub fn store(&self, symbol: &str, closes: &[f64]) {
        self.entries
            .insert(symbol.to_string(), RwLock::new(CacheEntry::new(closes.to_vec())));
        self.stats.write().stores += 1;
    }

    pub fn clear(&self) {
        self.entries.clear();
        *self.stats.write() = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
