//! The pure computation core.
//!
//! Operates entirely on already-fetched, in-memory price history: no
//! suspension, no I/O, no shared state. Per-symbol VaR reports run on the
//! rayon pool and are reassembled in the caller-supplied symbol order,
//! since weights and beta rely on positional correspondence.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rl_optimizer::OptimizerConfig;
use rl_risk::{
    align, beta, covariance, cvar_key, expected_annual_return, log_returns, portfolio_returns,
    portfolio_volatility, VarCalculator, VarConfig, VarMethod,
};
use rl_types::{
    DataError, MetricMap, OptimizeRequest, OptimizeResponse, PriceSeries, ReturnSeries,
    RiskRequest, RiskResponse, RlResult, EXPECTED_ANNUAL_RETURN_KEY, PORTFOLIO_BETA_KEY,
    PORTFOLIO_KEY, PORTFOLIO_VOLATILITY_KEY,
};

/// Engine-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub var: VarConfig,
    pub optimizer: OptimizerConfig,
}

/// Compute the full risk response for a request.
///
/// `closes_by_symbol` must be in the same order as `request.symbols`;
/// `benchmark_closes` is the optional benchmark history. Validation
/// failures reject the request before any statistic is computed; a single
/// symbol's bad history degrades only that symbol's entries.
pub fn analyze(
    request: &RiskRequest,
    closes_by_symbol: &[Vec<f64>],
    benchmark_closes: Option<&[f64]>,
    config: &EngineConfig,
) -> RlResult<RiskResponse> {
    request.validate()?;
    if closes_by_symbol.len() != request.symbols.len() {
        return Err(rl_types::RlError::Internal(format!(
            "price history count {} does not match symbol count {}",
            closes_by_symbol.len(),
            request.symbols.len()
        )));
    }

    let weights = request.normalized_weights();
    let calculator = VarCalculator::new(config.var.clone());

    let returns_by_symbol = build_returns(&request.symbols, closes_by_symbol);

    if returns_by_symbol.iter().all(Option::is_none) {
        return Err(DataError::InsufficientData {
            symbol: request.symbols.join(","),
            message: "no symbol has at least 2 valid closes".to_string(),
        }
        .into());
    }

    // Per-symbol reports in parallel; collect preserves input order.
    let per_symbol: Vec<MetricMap> = returns_by_symbol
        .par_iter()
        .map(|maybe_returns| match maybe_returns {
            Some(returns) => symbol_metrics(&calculator, returns, request),
            None => not_computable_metrics(request),
        })
        .collect();

    let mut results: BTreeMap<String, MetricMap> = request
        .symbols
        .iter()
        .cloned()
        .zip(per_symbol)
        .collect();

    results.insert(
        PORTFOLIO_KEY.to_string(),
        portfolio_metrics(
            &calculator,
            &returns_by_symbol,
            &weights,
            benchmark_closes,
            request,
        ),
    );

    Ok(RiskResponse::new(results))
}

/// Find the max-Sharpe allocation for the requested symbols.
///
/// Symbols without usable return data are dropped (and logged) before the
/// solver runs; the optimizer itself fails when fewer than 2 remain.
pub fn allocate(
    request: &OptimizeRequest,
    closes_by_symbol: &[Vec<f64>],
    config: &EngineConfig,
) -> RlResult<OptimizeResponse> {
    request.validate()?;
    if closes_by_symbol.len() != request.symbols.len() {
        return Err(rl_types::RlError::Internal(format!(
            "price history count {} does not match symbol count {}",
            closes_by_symbol.len(),
            request.symbols.len()
        )));
    }

    let returns_by_symbol = build_returns(&request.symbols, closes_by_symbol);

    let mut usable_symbols: Vec<&str> = Vec::new();
    let mut usable_series: Vec<ReturnSeries> = Vec::new();
    for (symbol, maybe_returns) in request.symbols.iter().zip(&returns_by_symbol) {
        match maybe_returns {
            Some(returns) if returns.len() >= 2 => {
                usable_symbols.push(symbol.as_str());
                usable_series.push(returns.clone());
            }
            _ => warn!("Dropping {} from optimization: insufficient history", symbol),
        }
    }

    let allocation = rl_optimizer::optimize_with(&usable_series, &config.optimizer)?;
    debug!(
        "Optimization converged: sharpe {:.4}, volatility {:.6}",
        allocation.sharpe_ratio, allocation.volatility
    );

    let optimal_weights = usable_symbols
        .into_iter()
        .map(str::to_string)
        .zip(allocation.weights)
        .collect();

    Ok(OptimizeResponse { optimal_weights })
}

/// Per-symbol return series; `None` marks a symbol whose history is
/// insufficient or invalid (that symbol degrades, the request survives).
fn build_returns(symbols: &[String], closes_by_symbol: &[Vec<f64>]) -> Vec<Option<ReturnSeries>> {
    symbols
        .iter()
        .zip(closes_by_symbol)
        .map(|(symbol, closes)| {
            let prices = PriceSeries::new(symbol.clone(), closes.clone());
            match log_returns(&prices) {
                Ok(returns) if !returns.is_empty() => Some(returns),
                Ok(_) => {
                    warn!(
                        "Insufficient history for {}: {} closes",
                        symbol,
                        closes.len()
                    );
                    None
                }
                Err(e) => {
                    warn!("Rejecting history for {}: {}", symbol, e);
                    None
                }
            }
        })
        .collect()
}

fn symbol_metrics(
    calculator: &VarCalculator,
    returns: &ReturnSeries,
    request: &RiskRequest,
) -> MetricMap {
    let mut metrics = calculator.report(returns, &request.confidence_levels, &request.horizons);
    for &confidence in &request.confidence_levels {
        metrics.insert(
            cvar_key(confidence),
            calculator.expected_shortfall(returns, confidence),
        );
    }
    metrics.insert(
        EXPECTED_ANNUAL_RETURN_KEY.to_string(),
        expected_annual_return(returns),
    );
    metrics
}

/// The all-null metric map for a symbol whose history cannot be used.
fn not_computable_metrics(request: &RiskRequest) -> MetricMap {
    let mut metrics = MetricMap::new();
    for method in VarMethod::ALL {
        for &confidence in &request.confidence_levels {
            for &horizon in &request.horizons {
                metrics.insert(method.key(horizon, confidence), None);
            }
        }
    }
    for &confidence in &request.confidence_levels {
        metrics.insert(cvar_key(confidence), None);
    }
    metrics.insert(EXPECTED_ANNUAL_RETURN_KEY.to_string(), None);
    metrics
}

/// Portfolio-level entry: VaR report over the weighted return series, plus
/// covariance volatility and benchmark beta where computable.
fn portfolio_metrics(
    calculator: &VarCalculator,
    returns_by_symbol: &[Option<ReturnSeries>],
    weights: &[f64],
    benchmark_closes: Option<&[f64]>,
    request: &RiskRequest,
) -> MetricMap {
    // Keep only symbols with data, in order; renormalize their weights so
    // the portfolio series stays fully invested.
    let mut series: Vec<ReturnSeries> = Vec::new();
    let mut live_weights: Vec<f64> = Vec::new();
    for (maybe_returns, &weight) in returns_by_symbol.iter().zip(weights) {
        if let Some(returns) = maybe_returns {
            series.push(returns.clone());
            live_weights.push(weight);
        }
    }
    let live_total: f64 = live_weights.iter().sum();
    if live_total > 0.0 {
        for weight in live_weights.iter_mut() {
            *weight /= live_total;
        }
    }

    let aligned = align(&series);
    let portfolio_series = portfolio_returns(&aligned, &live_weights);

    let mut metrics = symbol_metrics(calculator, &portfolio_series, request);

    metrics.insert(
        PORTFOLIO_VOLATILITY_KEY.to_string(),
        covariance(&aligned).map(|cov| portfolio_volatility(&live_weights, &cov)),
    );

    if let Some(closes) = benchmark_closes {
        let benchmark_returns = log_returns(&PriceSeries::new("benchmark", closes.to_vec()))
            .unwrap_or_default();
        metrics.insert(
            PORTFOLIO_BETA_KEY.to_string(),
            beta(&portfolio_series, &benchmark_returns),
        );
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rl_types::{OptimizeError, RequestError, RlError};

    fn config() -> EngineConfig {
        EngineConfig {
            var: VarConfig {
                simulations: 2_000,
                seed: Some(7),
            },
            optimizer: OptimizerConfig::default(),
        }
    }

    /// Two distinct oscillating price walks with enough history.
    fn two_histories() -> Vec<Vec<f64>> {
        let a = (0..60)
            .map(|i| 100.0 * (1.0 + 0.01 * ((i as f64) * 0.9).sin()))
            .collect();
        let b = (0..60)
            .map(|i| 50.0 * (1.0 + 0.02 * ((i as f64) * 0.53 + 0.7).cos()))
            .collect();
        vec![a, b]
    }

    #[test]
    fn test_shape_mismatch_rejected_before_computation() {
        let request = RiskRequest::new(
            vec!["AAPL".into(), "MSFT".into(), "GOOG".into()],
            vec![50.0, 50.0],
        );
        let result = analyze(&request, &[vec![], vec![], vec![]], None, &config());
        assert!(matches!(
            result,
            Err(RlError::Request(RequestError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_full_response_shape() {
        let request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![60.0, 40.0]);
        let response = analyze(&request, &two_histories(), None, &config()).unwrap();

        assert_eq!(response.results.len(), 3); // two symbols + Portfolio
        assert!(response.results.contains_key("AAPL"));
        assert!(response.results.contains_key("MSFT"));
        assert!(response.results.contains_key(PORTFOLIO_KEY));

        let aapl = &response.results["AAPL"];
        assert!(aapl["Normal_VaR_1D_95"].is_some());
        assert!(aapl["Historical_VaR_1D_99"].is_some());
        assert!(aapl["MonteCarlo_VaR_1D_95"].is_some());
        assert!(aapl["CornishFisher_VaR_1D_99"].is_some());
        assert!(aapl[EXPECTED_ANNUAL_RETURN_KEY].is_some());
        assert!(aapl["CVaR_95"].is_some());

        let portfolio = &response.results[PORTFOLIO_KEY];
        assert!(portfolio["Normal_VaR_1D_95"].is_some());
        assert!(portfolio[PORTFOLIO_VOLATILITY_KEY].is_some());
        // No benchmark supplied, so no beta key at all
        assert!(!portfolio.contains_key(PORTFOLIO_BETA_KEY));
    }

    #[test]
    fn test_short_history_degrades_only_that_symbol() {
        let mut histories = two_histories();
        histories[1] = vec![100.0]; // single close: insufficient

        let request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![60.0, 40.0]);
        let response = analyze(&request, &histories, None, &config()).unwrap();

        let healthy = &response.results["AAPL"];
        assert!(healthy["Normal_VaR_1D_95"].is_some());

        let degraded = &response.results["MSFT"];
        for value in degraded.values() {
            assert!(value.is_none());
        }

        // Portfolio still computes from the surviving symbol
        let portfolio = &response.results[PORTFOLIO_KEY];
        assert!(portfolio["Historical_VaR_1D_95"].is_some());
        // Covariance needs 2 securities, so volatility is not computable
        assert!(portfolio[PORTFOLIO_VOLATILITY_KEY].is_none());
    }

    #[test]
    fn test_all_symbols_insufficient_fails_request() {
        let request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![60.0, 40.0]);
        let result = analyze(&request, &[vec![100.0], vec![]], None, &config());
        assert!(matches!(result, Err(RlError::Data(_))));
    }

    #[test]
    fn test_invalid_prices_degrade_symbol() {
        let mut histories = two_histories();
        histories[0][10] = -4.0; // corrupt close

        let request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![50.0, 50.0]);
        let response = analyze(&request, &histories, None, &config()).unwrap();

        assert!(response.results["AAPL"]["Normal_VaR_1D_95"].is_none());
        assert!(response.results["MSFT"]["Normal_VaR_1D_95"].is_some());
    }

    #[test]
    fn test_horizon_scaling_in_response() {
        let mut request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![50.0, 50.0]);
        request.horizons = vec![1, 5];
        let response = analyze(&request, &two_histories(), None, &config()).unwrap();

        let aapl = &response.results["AAPL"];
        let one_day = aapl["Historical_VaR_1D_95"].unwrap();
        let five_day = aapl["Historical_VaR_5D_95"].unwrap();
        assert_relative_eq!(five_day, one_day * 5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_beta_against_self_benchmark() {
        let histories = two_histories();
        let benchmark = histories[0].clone();

        let mut request = RiskRequest::new(vec!["AAPL".into()], vec![100.0]);
        request.benchmark = Some("SPY".into());
        let response = analyze(&request, &histories[..1], Some(&benchmark), &config()).unwrap();

        // Single-asset portfolio benchmarked against its own history
        let beta = response.results[PORTFOLIO_KEY][PORTFOLIO_BETA_KEY].unwrap();
        assert_relative_eq!(beta, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_benchmark_beta_not_computable() {
        let histories = two_histories();
        let flat = vec![100.0; 60];

        let mut request = RiskRequest::new(vec!["AAPL".into(), "MSFT".into()], vec![50.0, 50.0]);
        request.benchmark = Some("FLAT".into());
        let response = analyze(&request, &histories, Some(&flat), &config()).unwrap();

        assert!(response.results[PORTFOLIO_KEY][PORTFOLIO_BETA_KEY].is_none());
    }

    #[test]
    fn test_allocate_success() {
        let request = OptimizeRequest::new(vec!["AAPL".into(), "MSFT".into()]);
        let response = allocate(&request, &two_histories(), &config()).unwrap();

        assert_eq!(response.optimal_weights.len(), 2);
        let total: f64 = response.optimal_weights.values().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        for weight in response.optimal_weights.values() {
            assert!((0.0..=1.0 + 1e-9).contains(weight));
        }
    }

    #[test]
    fn test_allocate_identical_histories_fails_singular() {
        let history = two_histories().remove(0);
        let request = OptimizeRequest::new(vec!["AAPL".into(), "COPY".into()]);
        let result = allocate(&request, &[history.clone(), history], &config());
        assert!(matches!(
            result,
            Err(RlError::Optimize(OptimizeError::SingularCovariance))
        ));
    }

    #[test]
    fn test_allocate_too_few_usable() {
        let histories = vec![two_histories().remove(0), vec![100.0]];
        let request = OptimizeRequest::new(vec!["AAPL".into(), "THIN".into()]);
        let result = allocate(&request, &histories, &config());
        assert!(matches!(
            result,
            Err(RlError::Optimize(OptimizeError::TooFewAssets(1)))
        ));
    }
}
