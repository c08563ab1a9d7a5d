use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::RequestError;

/// Reserved key for portfolio-level entries in a [`RiskResponse`].
pub const PORTFOLIO_KEY: &str = "Portfolio";

/// Metric key for the annualized expected return (`mean * 252`).
pub const EXPECTED_ANNUAL_RETURN_KEY: &str = "Expected_Annual_Return";

/// Metric key for the portfolio's benchmark beta.
pub const PORTFOLIO_BETA_KEY: &str = "Portfolio_Beta";

/// Metric key for covariance-based portfolio volatility.
pub const PORTFOLIO_VOLATILITY_KEY: &str = "Portfolio_Volatility";

/// Metric map for one symbol: metric key → value, `None` = not computable.
pub type MetricMap = BTreeMap<String, Option<f64>>;

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

fn default_horizons() -> Vec<u32> {
    vec![1]
}

/// A portfolio risk request as received from the gateway.
///
/// Weights arrive as 0–100 percentages in the same order as `symbols` and
/// are normalized to fractions via [`Self::normalized_weights`]; the order
/// is never changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRequest {
    pub symbols: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    #[serde(default = "default_horizons")]
    pub horizons: Vec<u32>,
    /// Optional benchmark symbol for portfolio beta.
    #[serde(default)]
    pub benchmark: Option<String>,
}

impl RiskRequest {
    pub fn new(symbols: Vec<String>, weights: Vec<f64>) -> Self {
        Self {
            symbols,
            weights,
            confidence_levels: default_confidence_levels(),
            horizons: default_horizons(),
            benchmark: None,
        }
    }

    /// Fail-fast shape validation; must pass before any statistic is computed.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.symbols.is_empty() {
            return Err(RequestError::NoSymbols);
        }
        if self.symbols.len() != self.weights.len() {
            return Err(RequestError::ShapeMismatch {
                symbols: self.symbols.len(),
                weights: self.weights.len(),
            });
        }
        for (symbol, &weight) in self.symbols.iter().zip(&self.weights) {
            if weight < 0.0 {
                return Err(RequestError::NegativeWeight {
                    symbol: symbol.clone(),
                    weight,
                });
            }
        }
        if self.weights.iter().sum::<f64>() <= 0.0 {
            return Err(RequestError::ZeroWeights);
        }
        for &confidence in &self.confidence_levels {
            if !(confidence > 0.0 && confidence < 1.0) {
                return Err(RequestError::InvalidConfidence(confidence));
            }
        }
        for &horizon in &self.horizons {
            if horizon == 0 {
                return Err(RequestError::InvalidHorizon(horizon));
            }
        }
        Ok(())
    }

    /// Weights as fractions summing to 1, dividing by the total so inputs
    /// already expressed as fractions normalize the same way. Order preserved.
    pub fn normalized_weights(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().sum();
        self.weights.iter().map(|w| w / total).collect()
    }
}

/// A weight-allocation request: find the max-Sharpe long-only weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub symbols: Vec<String>,
}

impl OptimizeRequest {
    pub fn new(symbols: Vec<String>) -> Self {
        Self { symbols }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.symbols.is_empty() {
            return Err(RequestError::NoSymbols);
        }
        Ok(())
    }
}

/// Full risk response: per-symbol metric maps plus the reserved
/// [`PORTFOLIO_KEY`] entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResponse {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub results: BTreeMap<String, MetricMap>,
}

impl RiskResponse {
    pub fn new(results: BTreeMap<String, MetricMap>) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            results,
        }
    }
}

/// Successful optimizer response; weights are fractions summing to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub optimal_weights: BTreeMap<String, f64>,
}
