//! Value-at-Risk estimation.
//!
//! Four independent estimators over a single return series:
//! - Normal (parametric): `Φ⁻¹(1 − c) * σ + μ`
//! - Historical: empirical `(1 − c)`-quantile of the sample
//! - Monte Carlo: the Historical estimator over draws from a fitted Normal
//! - Cornish-Fisher: Normal quantile corrected for skewness and kurtosis
//!
//! Results are the signed return quantile (losses are negative). Each
//! estimator yields `None` when its own preconditions fail; one method's
//! degeneracy never suppresses the others.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as StandardNormal};

use rl_types::{MetricMap, ReturnSeries};

/// VaR estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarMethod {
    Normal,
    Historical,
    MonteCarlo,
    CornishFisher,
}

impl VarMethod {
    pub const ALL: [VarMethod; 4] = [
        VarMethod::Normal,
        VarMethod::Historical,
        VarMethod::MonteCarlo,
        VarMethod::CornishFisher,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VarMethod::Normal => "Normal",
            VarMethod::Historical => "Historical",
            VarMethod::MonteCarlo => "MonteCarlo",
            VarMethod::CornishFisher => "CornishFisher",
        }
    }

    /// Report key, e.g. `Historical_VaR_5D_99`.
    pub fn key(&self, horizon: u32, confidence: f64) -> String {
        format!(
            "{}_VaR_{}D_{}",
            self.label(),
            horizon,
            (confidence * 100.0).round() as u32
        )
    }
}

/// VaR engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarConfig {
    /// Number of Monte Carlo draws per estimate
    pub simulations: usize,

    /// Random seed for reproducible Monte Carlo (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for VarConfig {
    fn default() -> Self {
        Self {
            simulations: 10_000,
            seed: None,
        }
    }
}

/// Stateless VaR calculator; Monte Carlo is the only stochastic method and
/// the only one affected by [`VarConfig::seed`].
#[derive(Debug, Clone, Default)]
pub struct VarCalculator {
    config: VarConfig,
}

impl VarCalculator {
    pub fn new(config: VarConfig) -> Self {
        Self { config }
    }

    /// Parametric-normal 1-day VaR. `None` when σ = 0 or fewer than 2 returns.
    pub fn normal(&self, returns: &ReturnSeries, confidence: f64) -> Option<f64> {
        let mean = returns.mean()?;
        let std = returns.sample_std()?;
        if std == 0.0 {
            return None;
        }
        Some(mean + z_score(confidence)? * std)
    }

    /// Historical-simulation 1-day VaR. Requires at least one return.
    pub fn historical(&self, returns: &ReturnSeries, confidence: f64) -> Option<f64> {
        if returns.is_empty() {
            return None;
        }
        Some(empirical_quantile(&returns.values, 1.0 - confidence))
    }

    /// Monte Carlo 1-day VaR: draws from `Normal(μ, σ)` fit to the sample,
    /// then the Historical estimator on the simulated sample. Shares the
    /// Normal method's preconditions.
    pub fn monte_carlo(&self, returns: &ReturnSeries, confidence: f64) -> Option<f64> {
        let mean = returns.mean()?;
        let std = returns.sample_std()?;
        if std == 0.0 || self.config.simulations == 0 {
            return None;
        }

        let normal = Normal::new(mean, std).ok()?;
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let simulated: Vec<f64> = (0..self.config.simulations)
            .map(|_| normal.sample(&mut rng))
            .collect();

        Some(empirical_quantile(&simulated, 1.0 - confidence))
    }

    /// Cornish-Fisher 1-day VaR: the Normal quantile adjusted for sample
    /// skewness and excess kurtosis. Equals the Normal estimate when both
    /// vanish.
    pub fn cornish_fisher(&self, returns: &ReturnSeries, confidence: f64) -> Option<f64> {
        let mean = returns.mean()?;
        let std = returns.sample_std()?;
        if std == 0.0 {
            return None;
        }
        let skew = returns.skewness()?;
        let excess_kurtosis = returns.excess_kurtosis()?;
        let z = z_score(confidence)?;
        Some(mean + adjusted_quantile(z, skew, excess_kurtosis) * std)
    }

    /// Dispatch on method.
    pub fn estimate(
        &self,
        returns: &ReturnSeries,
        method: VarMethod,
        confidence: f64,
    ) -> Option<f64> {
        match method {
            VarMethod::Normal => self.normal(returns, confidence),
            VarMethod::Historical => self.historical(returns, confidence),
            VarMethod::MonteCarlo => self.monte_carlo(returns, confidence),
            VarMethod::CornishFisher => self.cornish_fisher(returns, confidence),
        }
    }

    /// Expected shortfall (CVaR): mean of the returns at or below the
    /// historical VaR cut. `None` on an empty series.
    pub fn expected_shortfall(&self, returns: &ReturnSeries, confidence: f64) -> Option<f64> {
        if returns.is_empty() {
            return None;
        }
        let mut sorted = returns.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let cut = quantile_index(sorted.len(), 1.0 - confidence);
        let tail = &sorted[..=cut];
        Some(tail.iter().sum::<f64>() / tail.len() as f64)
    }

    /// Full report: every method × confidence × horizon cell, scaled by
    /// [`scale_horizon`].
    pub fn report(
        &self,
        returns: &ReturnSeries,
        confidence_levels: &[f64],
        horizons: &[u32],
    ) -> MetricMap {
        let mut report = MetricMap::new();
        for method in VarMethod::ALL {
            for &confidence in confidence_levels {
                let one_day = self.estimate(returns, method, confidence);
                for &horizon in horizons {
                    report.insert(
                        method.key(horizon, confidence),
                        one_day.map(|var| scale_horizon(var, horizon)),
                    );
                }
            }
        }
        report
    }
}

/// Report key for expected shortfall, e.g. `CVaR_95`.
pub fn cvar_key(confidence: f64) -> String {
    format!("CVaR_{}", (confidence * 100.0).round() as u32)
}

/// `Φ⁻¹(1 − confidence)` for the standard normal.
fn z_score(confidence: f64) -> Option<f64> {
    let normal = StandardNormal::new(0.0, 1.0).ok()?;
    Some(normal.inverse_cdf(1.0 - confidence))
}

/// Cornish-Fisher quantile correction:
/// `z + (z² − 1)s/6 + (z³ − 3z)k/24`. Identical to `z` when `s = k = 0`.
pub fn adjusted_quantile(z: f64, skew: f64, excess_kurtosis: f64) -> f64 {
    z + (z * z - 1.0) * skew / 6.0 + (z.powi(3) - 3.0 * z) * excess_kurtosis / 24.0
}

/// Square-root-of-time scaling: `VaR_h = VaR_1 * sqrt(h)`.
///
/// Assumes i.i.d. daily returns. For the Historical, Monte Carlo, and
/// Cornish-Fisher methods — which make no normality assumption otherwise —
/// this is an inherited approximation, applied uniformly rather than
/// per-method.
pub fn scale_horizon(var_one_day: f64, horizon: u32) -> f64 {
    var_one_day * (horizon as f64).sqrt()
}

/// Empirical `alpha`-quantile: the `⌊alpha · n⌋`-th order statistic of the
/// ascending sample.
fn empirical_quantile(values: &[f64], alpha: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[quantile_index(sorted.len(), alpha)]
}

fn quantile_index(len: usize, alpha: f64) -> usize {
    ((alpha * len as f64) as usize).min(len - 1)
}
