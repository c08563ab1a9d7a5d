//! Price history access for Riskline.
//!
//! Provides:
//! - The [`PriceProvider`] trait consumed by the risk engine
//! - HTTP (FMP), CSV, and synthetic provider implementations
//! - A TTL cache and the [`PriceService`] provider chain

pub mod cache;
pub mod providers;

pub use cache::{CacheStats, PriceCache};
pub use providers::{
    CsvPriceProvider, FmpProvider, PriceProvider, SyntheticProvider, MAX_HISTORY_DAYS,
};

use chrono::Duration;
use rl_types::{DataError, RlResult};
use tracing::warn;

/// Cache-first chain over an ordered list of providers.
///
/// The first provider claiming support for a symbol is asked; a provider
/// error moves on to the next one. Whatever the winning provider returns —
/// including an empty series — is cached and handed to the caller
/// unchanged; interpreting an empty series as "insufficient data" is the
/// engine's job, never grounds for substitution here.
#[derive(Debug)]
pub struct PriceService {
    cache: PriceCache,
    providers: Vec<Box<dyn PriceProvider>>,
}

impl PriceService {
    pub fn new() -> Self {
        Self {
            cache: PriceCache::new(),
            providers: Vec::new(),
        }
    }

    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self {
            cache: PriceCache::with_ttl(ttl),
            providers: Vec::new(),
        }
    }

    pub fn add_provider(&mut self, provider: Box<dyn PriceProvider>) {
        self.providers.push(provider);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Fetch daily closes for a symbol, oldest first, at most
    /// [`MAX_HISTORY_DAYS`] entries.
    pub async fn fetch(&self, symbol: &str) -> RlResult<Vec<f64>> {
        if let Some(closes) = self.cache.get(symbol) {
            return Ok(closes);
        }

        for provider in &self.providers {
            if !provider.supports_symbol(symbol) {
                continue;
            }
            match provider.fetch_closes(symbol).await {
                Ok(closes) => {
                    self.cache.store(symbol, &closes);
                    return Ok(closes);
                }
                Err(e) => {
                    warn!("Provider {} failed for {}: {}", provider.name(), symbol, e);
                }
            }
        }

        Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }
        .into())
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Provider that fails on every fetch.
    #[derive(Debug)]
    struct FailingProvider;

    #[async_trait]
    impl PriceProvider for FailingProvider {
        fn supports_symbol(&self, _symbol: &str) -> bool {
            true
        }

        async fn fetch_closes(&self, _symbol: &str) -> RlResult<Vec<f64>> {
            Err(DataError::LoadingFailed {
                message: "connection refused".to_string(),
            }
            .into())
        }

        fn name(&self) -> &str {
            "Failing Provider"
        }

        fn config(&self) -> serde_json::Value {
            serde_json::json!({"type": "failing"})
        }
    }

    #[tokio::test]
    async fn test_service_falls_through_to_next_provider() {
        let mut service = PriceService::new();
        service.add_provider(Box::new(FailingProvider));
        service.add_provider(Box::new(SyntheticProvider::new().with_days(10)));

        let closes = service.fetch("AAPL").await.unwrap();
        assert_eq!(closes.len(), 10);
    }

    #[tokio::test]
    async fn test_service_errors_when_all_providers_fail() {
        let mut service = PriceService::new();
        service.add_provider(Box::new(FailingProvider));

        // A failed fetch is an error, never fabricated data.
        assert!(service.fetch("AAPL").await.is_err());
    }

    #[tokio::test]
    async fn test_service_caches_fetches() {
        let mut service = PriceService::new();
        service.add_provider(Box::new(SyntheticProvider::new().with_days(10)));

        let first = service.fetch("AAPL").await.unwrap();
        let second = service.fetch("AAPL").await.unwrap();
        assert_eq!(first, second);

        let stats = service.cache_stats();
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.hits, 1);
    }
}
