//! Per-series companion metrics: rolling risk, risk-adjusted ratios, and
//! trailing moving averages.

use serde::{Deserialize, Serialize};

use rl_types::ReturnSeries;

use crate::returns::TRADING_DAYS_PER_YEAR;

/// Trailing window for rolling metrics.
pub const ROLLING_WINDOW: usize = 20;

/// Rolling values are reported as 0.0 until this many observations exist.
pub const MIN_WINDOW_OBSERVATIONS: usize = 5;

/// Short / long trailing moving-average windows.
pub const SHORT_MA_WINDOW: usize = 20;
pub const LONG_MA_WINDOW: usize = 50;

/// Annual risk-free rate used by the Sharpe and Sortino ratios.
const RISK_FREE_RATE_ANNUAL: f64 = 0.01;

/// Companion metrics for one symbol's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolAnalytics {
    pub symbol: String,
    /// Rolling 95% historical VaR per period, as a positive loss magnitude.
    pub rolling_var_95: Vec<f64>,
    /// Rolling volatility (population std) per period.
    pub rolling_volatility: Vec<f64>,
    /// Annualized Sharpe ratio; `None` when volatility is zero.
    pub sharpe_ratio: Option<f64>,
    /// Annualized Sortino ratio; `None` without downside observations.
    pub sortino_ratio: Option<f64>,
    /// Trailing simple moving averages over the closes.
    pub short_ma: Vec<f64>,
    pub long_ma: Vec<f64>,
}

/// Compute the full analytics bundle for one symbol.
pub fn analyze_symbol(symbol: &str, closes: &[f64], returns: &ReturnSeries) -> SymbolAnalytics {
    let (short_ma, long_ma) = moving_averages(closes, SHORT_MA_WINDOW, LONG_MA_WINDOW);
    SymbolAnalytics {
        symbol: symbol.to_string(),
        rolling_var_95: rolling_var(&returns.values, ROLLING_WINDOW, 0.95),
        rolling_volatility: rolling_volatility(&returns.values, ROLLING_WINDOW),
        sharpe_ratio: sharpe_ratio(&returns.values),
        sortino_ratio: sortino_ratio(&returns.values),
        short_ma,
        long_ma,
    }
}

/// Rolling historical VaR over a trailing window, reported as a positive
/// loss magnitude; 0.0 while the window holds fewer than
/// [`MIN_WINDOW_OBSERVATIONS`].
pub fn rolling_var(returns: &[f64], window: usize, confidence: f64) -> Vec<f64> {
    let alpha = 1.0 - confidence;
    (0..returns.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &returns[start..=i];
            if slice.len() < MIN_WINDOW_OBSERVATIONS {
                return 0.0;
            }
            let mut sorted = slice.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            -sorted[((alpha * sorted.len() as f64) as usize).min(sorted.len() - 1)]
        })
        .collect()
}

/// Rolling volatility (population std) over a trailing window; same
/// minimum-observation rule as [`rolling_var`].
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    (0..returns.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &returns[start..=i];
            if slice.len() < MIN_WINDOW_OBSERVATIONS {
                return 0.0;
            }
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let variance =
                slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / slice.len() as f64;
            variance.sqrt()
        })
        .collect()
}

/// Annualized Sharpe ratio against a 1% annual risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return None;
    }
    let risk_free_daily = RISK_FREE_RATE_ANNUAL / TRADING_DAYS_PER_YEAR;
    Some((mean - risk_free_daily) / std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized Sortino ratio: like Sharpe but deviation is computed over
/// negative returns only.
pub fn sortino_ratio(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return None;
    }
    let downside_mean = downside.iter().sum::<f64>() / downside.len() as f64;
    let downside_variance = downside
        .iter()
        .map(|r| (r - downside_mean).powi(2))
        .sum::<f64>()
        / downside.len() as f64;
    let downside_std = downside_variance.sqrt();
    if downside_std == 0.0 {
        return None;
    }
    let risk_free_daily = RISK_FREE_RATE_ANNUAL / TRADING_DAYS_PER_YEAR;
    Some((mean - risk_free_daily) / downside_std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Trailing simple moving averages over the close series.
pub fn moving_averages(closes: &[f64], short: usize, long: usize) -> (Vec<f64>, Vec<f64>) {
    let trailing_mean = |window: usize| -> Vec<f64> {
        (0..closes.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                let slice = &closes[start..=i];
                slice.iter().sum::<f64>() / slice.len() as f64
            })
            .collect()
    };
    (trailing_mean(short), trailing_mean(long))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rolling_var_warms_up() {
        let returns = vec![0.01, -0.02, 0.015, -0.005, 0.02, -0.03];
        let rolling = rolling_var(&returns, 20, 0.95);

        assert_eq!(rolling.len(), returns.len());
        // First four windows are below the observation floor
        assert!(rolling[..4].iter().all(|v| *v == 0.0));
        // Fifth window: worst of the first five returns
        assert_relative_eq!(rolling[4], 0.02, epsilon = 1e-12);
        assert_relative_eq!(rolling[5], 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_volatility_constant_returns() {
        let returns = vec![0.01; 8];
        let rolling = rolling_volatility(&returns, 20);
        assert!(rolling[..4].iter().all(|v| *v == 0.0));
        assert!(rolling[4..].iter().all(|v| *v == 0.0)); // zero spread
    }

    #[test]
    fn test_sharpe_ratio_sign() {
        let gains = vec![0.01; 30];
        // Constant series has zero volatility
        assert!(sharpe_ratio(&gains).is_none());

        let mixed = vec![0.02, -0.01, 0.015, -0.005, 0.01, 0.0, 0.02, -0.002];
        let sharpe = sharpe_ratio(&mixed).unwrap();
        assert!(sharpe > 0.0);
    }

    #[test]
    fn test_sortino_requires_downside() {
        let all_gains = vec![0.01, 0.02, 0.005];
        assert!(sortino_ratio(&all_gains).is_none());

        let mixed = vec![0.02, -0.01, 0.015, -0.02, 0.01];
        assert!(sortino_ratio(&mixed).is_some());
    }

    #[test]
    fn test_moving_averages_trailing_mean() {
        let closes = vec![100.0, 102.0, 104.0, 106.0];
        let (short, long) = moving_averages(&closes, 2, 3);

        assert_relative_eq!(short[0], 100.0, epsilon = 1e-12);
        assert_relative_eq!(short[1], 101.0, epsilon = 1e-12);
        assert_relative_eq!(short[3], 105.0, epsilon = 1e-12);
        assert_relative_eq!(long[3], 104.0, epsilon = 1e-12);
    }

    #[test]
    fn test_analyze_symbol_bundle() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.9).sin()).collect();
        let returns = crate::returns::log_returns(&rl_types::PriceSeries::new(
            "TEST",
            closes.clone(),
        ))
        .unwrap();

        let analytics = analyze_symbol("TEST", &closes, &returns);
        assert_eq!(analytics.symbol, "TEST");
        assert_eq!(analytics.rolling_var_95.len(), returns.len());
        assert_eq!(analytics.short_ma.len(), closes.len());
        assert!(analytics.sharpe_ratio.is_some());
    }
}
