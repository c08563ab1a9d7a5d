//! Cross-security aggregation: covariance, portfolio series, beta.
//!
//! Rows and columns of the covariance matrix correspond 1:1 and in-order
//! to the securities list as supplied by the caller; nothing here reorders.

use rl_types::ReturnSeries;

/// Symmetric covariance matrix over the aligned securities.
pub type CovarianceMatrix = Vec<Vec<f64>>;

/// Truncate all series to the shortest one, keeping the most recent
/// observations. Alignment is explicit: mixed-length histories are a normal
/// provider outcome, and the overlap is always the common tail.
pub fn align(series: &[ReturnSeries]) -> Vec<ReturnSeries> {
    let common = series.iter().map(|s| s.len()).min().unwrap_or(0);
    series
        .iter()
        .map(|s| ReturnSeries::new(s.values[s.len() - common..].to_vec()))
        .collect()
}

/// Sample covariance matrix (n − 1 denominator) across aligned series.
///
/// `None` with fewer than 2 series or fewer than 2 aligned observations.
pub fn covariance(aligned: &[ReturnSeries]) -> Option<CovarianceMatrix> {
    if aligned.len() < 2 {
        return None;
    }
    let periods = aligned.iter().map(|s| s.len()).min()?;
    if periods < 2 {
        return None;
    }

    let means: Vec<f64> = aligned.iter().map(|s| s.mean().unwrap_or(0.0)).collect();
    let n = aligned.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in i..n {
            let cov = (0..periods)
                .map(|t| (aligned[i].values[t] - means[i]) * (aligned[j].values[t] - means[j]))
                .sum::<f64>()
                / (periods - 1) as f64;
            matrix[i][j] = cov;
            matrix[j][i] = cov;
        }
    }

    Some(matrix)
}

/// Portfolio return series: the weighted sum across securities at each
/// time step, `Σ_i w_i * r_i[t]`.
pub fn portfolio_returns(aligned: &[ReturnSeries], weights: &[f64]) -> ReturnSeries {
    let periods = aligned.iter().map(|s| s.len()).min().unwrap_or(0);
    let values = (0..periods)
        .map(|t| {
            aligned
                .iter()
                .zip(weights)
                .map(|(series, weight)| weight * series.values[t])
                .sum()
        })
        .collect();
    ReturnSeries::new(values)
}

/// Portfolio volatility `sqrt(wᵀ · Σ · w)`.
pub fn portfolio_volatility(weights: &[f64], covariance: &CovarianceMatrix) -> f64 {
    let quadratic: f64 = covariance
        .iter()
        .zip(weights)
        .map(|(row, &w_i)| {
            w_i * row
                .iter()
                .zip(weights)
                .map(|(&cov, &w_j)| cov * w_j)
                .sum::<f64>()
        })
        .sum();
    quadratic.max(0.0).sqrt()
}

/// Benchmark beta `Cov(Rp, Rm) / Var(Rm)` over the common (most recent)
/// window. `None` when the benchmark variance is zero or fewer than 2
/// overlapping returns exist.
pub fn beta(portfolio: &ReturnSeries, market: &ReturnSeries) -> Option<f64> {
    let aligned = align(&[portfolio.clone(), market.clone()]);
    let matrix = covariance(&aligned)?;

    let market_variance = matrix[1][1];
    if market_variance == 0.0 {
        return None;
    }
    Some(matrix[0][1] / market_variance)
}
