//! Riskline request orchestration.
//!
//! [`RiskEngine`] owns a [`PriceService`] and drives the fetch-then-compute
//! cycle: price history is gathered per symbol (a failed fetch degrades
//! that symbol, it does not abort the request), then handed to the pure
//! computation core in [`engine`]. The engine itself holds no state across
//! requests; the only shared state is the provider-side cache.

pub mod engine;

pub use engine::{allocate, analyze, EngineConfig};

use tracing::{info, warn};

use rl_data::PriceService;
use rl_risk::{analyze_symbol, log_returns, SymbolAnalytics};
use rl_types::{
    OptimizeRequest, OptimizeResponse, PriceSeries, RiskRequest, RiskResponse, RlResult,
};

/// High-level engine: price access plus the computation core.
#[derive(Debug)]
pub struct RiskEngine {
    prices: PriceService,
    config: EngineConfig,
}

impl RiskEngine {
    pub fn new(prices: PriceService) -> Self {
        Self {
            prices,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(prices: PriceService, config: EngineConfig) -> Self {
        Self { prices, config }
    }

    /// Full VaR report for a portfolio request.
    pub async fn calculate(&self, request: &RiskRequest) -> RlResult<RiskResponse> {
        request.validate()?;
        info!(
            "Risk request for {} symbols, {} confidence levels",
            request.symbols.len(),
            request.confidence_levels.len()
        );

        let closes = self.fetch_all(&request.symbols).await;

        let benchmark_closes = match &request.benchmark {
            Some(benchmark) => match self.prices.fetch(benchmark).await {
                Ok(closes) => Some(closes),
                Err(e) => {
                    warn!("Benchmark {} unavailable: {}", benchmark, e);
                    None
                }
            },
            None => None,
        };

        engine::analyze(request, &closes, benchmark_closes.as_deref(), &self.config)
    }

    /// Max-Sharpe weight allocation for the requested symbols.
    pub async fn optimize(&self, request: &OptimizeRequest) -> RlResult<OptimizeResponse> {
        request.validate()?;
        info!("Optimization request for {} symbols", request.symbols.len());

        let closes = self.fetch_all(&request.symbols).await;
        engine::allocate(request, &closes, &self.config)
    }

    /// Companion analytics for one symbol's history.
    pub async fn analytics(&self, symbol: &str) -> RlResult<SymbolAnalytics> {
        let closes = self.prices.fetch(symbol).await?;
        let returns = log_returns(&PriceSeries::new(symbol, closes.clone()))?;
        Ok(analyze_symbol(symbol, &closes, &returns))
    }

    /// Fetch histories in request order; a failed fetch becomes an empty
    /// series so only that symbol degrades.
    async fn fetch_all(&self, symbols: &[String]) -> Vec<Vec<f64>> {
        let mut closes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.prices.fetch(symbol).await {
                Ok(series) => closes.push(series),
                Err(e) => {
                    warn!("Fetch failed for {}: {}", symbol, e);
                    closes.push(Vec::new());
                }
            }
        }
        closes
    }
}
