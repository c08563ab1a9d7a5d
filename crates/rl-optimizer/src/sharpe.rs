//! Max-Sharpe weight search.
//!
//! Maximizes `E[Rp] / σ(Rp)` subject to full investment (`Σw = 1`) and no
//! short selling (`0 ≤ w_i ≤ 1`). The unconstrained tangency solution
//! `w ∝ Σ⁻¹μ` is used when it already satisfies the box; otherwise a
//! projected gradient ascent with backtracking runs from equal weights.
//! A singular covariance matrix (perfectly correlated assets) is detected
//! upfront and surfaced as a failure, never as NaN weights.

use serde::{Deserialize, Serialize};
use tracing::debug;

use rl_risk::{align, covariance, CovarianceMatrix};
use rl_types::{OptimizeError, ReturnSeries};

/// Solver parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Upper bound on gradient-ascent iterations.
    pub max_iterations: usize,
    /// Initial ascent step size.
    pub initial_step: f64,
    /// Step size below which the search is considered converged.
    pub min_step: f64,
    /// Pivot magnitude below which the covariance matrix counts as singular.
    pub pivot_threshold: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            initial_step: 0.05,
            min_step: 1e-10,
            pivot_threshold: 1e-12,
        }
    }
}

/// A successful optimization: weights in input order, summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub weights: Vec<f64>,
    /// Daily expected portfolio return at these weights.
    pub expected_return: f64,
    /// Daily portfolio volatility at these weights.
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Optimize with default parameters.
pub fn optimize(series: &[ReturnSeries]) -> Result<Allocation, OptimizeError> {
    optimize_with(series, &OptimizerConfig::default())
}

/// Find the long-only, fully invested max-Sharpe weights for the given
/// return series (one per security, caller order preserved).
pub fn optimize_with(
    series: &[ReturnSeries],
    config: &OptimizerConfig,
) -> Result<Allocation, OptimizeError> {
    let usable = series.iter().filter(|s| s.len() >= 2).count();
    if usable < 2 || series.len() != usable {
        return Err(OptimizeError::TooFewAssets(usable));
    }

    let aligned = align(series);
    let sigma = covariance(&aligned).ok_or(OptimizeError::TooFewAssets(usable))?;
    let mu: Vec<f64> = aligned.iter().map(|s| s.mean().unwrap_or(0.0)).collect();

    // Upfront singularity check; also yields the analytic tangency candidate.
    let sigma_inv = invert(&sigma, config.pivot_threshold)
        .ok_or(OptimizeError::SingularCovariance)?;

    let raw: Vec<f64> = mat_vec(&sigma_inv, &mu);
    let denom: f64 = raw.iter().sum();
    if denom.abs() > config.pivot_threshold {
        let analytic: Vec<f64> = raw.iter().map(|w| w / denom).collect();
        if is_long_only(&analytic) {
            debug!("Unconstrained tangency weights already feasible");
            return finish(analytic, &mu, &sigma);
        }
    }

    gradient_ascent(&mu, &sigma, config)
}

/// Projected gradient ascent from equal weights, halving the step whenever
/// it fails to improve the objective. Terminates either at a step below
/// `min_step` (converged: no feasible improvement direction remains) or at
/// the iteration cap (non-convergence).
fn gradient_ascent(
    mu: &[f64],
    sigma: &CovarianceMatrix,
    config: &OptimizerConfig,
) -> Result<Allocation, OptimizeError> {
    let n = mu.len();
    let mut weights = vec![1.0 / n as f64; n];
    let mut current = sharpe(&weights, mu, sigma).ok_or(OptimizeError::DegenerateWeights)?;
    let mut step = config.initial_step;

    for iteration in 0..config.max_iterations {
        if step < config.min_step {
            debug!("Converged after {} iterations, sharpe {}", iteration, current);
            return finish(weights, mu, sigma);
        }

        let sigma_w = mat_vec(sigma, &weights);
        let port_ret: f64 = dot(&weights, mu);
        let port_risk: f64 = dot(&weights, &sigma_w).max(0.0).sqrt();
        if port_risk == 0.0 {
            return Err(OptimizeError::DegenerateWeights);
        }

        // dS/dw_i = μ_i/σ_p − E[Rp]·(Σw)_i/σ_p³
        let risk_cubed = port_risk.powi(3);
        let grad: Vec<f64> = (0..n)
            .map(|i| mu[i] / port_risk - port_ret * sigma_w[i] / risk_cubed)
            .collect();

        // An infeasible or non-improving candidate just shrinks the step.
        let candidate = project((0..n).map(|i| weights[i] + step * grad[i]).collect());
        match candidate {
            Some(candidate) => match sharpe(&candidate, mu, sigma) {
                Some(next) if next > current => {
                    weights = candidate;
                    current = next;
                }
                _ => step *= 0.5,
            },
            None => step *= 0.5,
        }
    }

    Err(OptimizeError::NonConvergence {
        iterations: config.max_iterations,
    })
}

fn finish(
    weights: Vec<f64>,
    mu: &[f64],
    sigma: &CovarianceMatrix,
) -> Result<Allocation, OptimizeError> {
    if weights.iter().any(|w| !w.is_finite()) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(OptimizeError::DegenerateWeights);
    }
    let expected_return = dot(&weights, mu);
    let volatility = dot(&weights, &mat_vec(sigma, &weights)).max(0.0).sqrt();
    let sharpe_ratio = sharpe(&weights, mu, sigma).ok_or(OptimizeError::DegenerateWeights)?;
    Ok(Allocation {
        weights,
        expected_return,
        volatility,
        sharpe_ratio,
    })
}

/// Sharpe ratio at the given weights; `None` when volatility vanishes or
/// the objective is non-finite.
fn sharpe(weights: &[f64], mu: &[f64], sigma: &CovarianceMatrix) -> Option<f64> {
    let risk = dot(weights, &mat_vec(sigma, weights)).max(0.0).sqrt();
    if risk == 0.0 {
        return None;
    }
    let value = dot(weights, mu) / risk;
    value.is_finite().then_some(value)
}

/// Project onto the constraint set: clamp to [0, 1], renormalize to sum 1.
fn project(mut weights: Vec<f64>) -> Option<Vec<f64>> {
    for w in weights.iter_mut() {
        *w = w.clamp(0.0, 1.0);
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    Some(weights)
}

fn is_long_only(weights: &[f64]) -> bool {
    weights.iter().all(|w| (-1e-9..=1.0 + 1e-9).contains(w))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mat_vec(matrix: &CovarianceMatrix, v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

/// Gauss-Jordan inversion with partial pivoting; `None` when a pivot falls
/// below `threshold` (singular matrix).
fn invert(matrix: &CovarianceMatrix, threshold: f64) -> Option<CovarianceMatrix> {
    let n = matrix.len();
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut extended = row.clone();
            extended.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            extended
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| {
            aug[a][col]
                .abs()
                .partial_cmp(&aug[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

        if aug[pivot_row][col].abs() < threshold {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for cell in aug[col].iter_mut() {
            *cell /= pivot;
        }

        let pivot_values = aug[col].clone();
        for (row, cells) in aug.iter_mut().enumerate() {
            if row == col {
                continue;
            }
            let factor = cells[col];
            for (cell, &pv) in cells.iter_mut().zip(&pivot_values) {
                *cell -= factor * pv;
            }
        }
    }

    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(values: &[f64]) -> ReturnSeries {
        ReturnSeries::new(values.to_vec())
    }

    /// Two weakly correlated assets with different means and volatilities.
    fn two_assets() -> Vec<ReturnSeries> {
        let a: Vec<f64> = (0..60)
            .map(|i| 0.0012 + 0.02 * ((i as f64) * 0.9).sin())
            .collect();
        let b: Vec<f64> = (0..60)
            .map(|i| 0.0006 + 0.01 * ((i as f64) * 0.9 + 1.3).cos())
            .collect();
        vec![series(&a), series(&b)]
    }

    fn three_assets() -> Vec<ReturnSeries> {
        let mut assets = two_assets();
        let c: Vec<f64> = (0..60)
            .map(|i| 0.0009 + 0.015 * ((i as f64) * 0.53 + 0.7).sin())
            .collect();
        assets.push(series(&c));
        assets
    }

    #[test]
    fn test_weights_sum_to_one_within_bounds() {
        for input in [two_assets(), three_assets()] {
            let allocation = optimize(&input).unwrap();
            assert_eq!(allocation.weights.len(), input.len());
            assert_relative_eq!(
                allocation.weights.iter().sum::<f64>(),
                1.0,
                epsilon = 1e-9
            );
            for &w in &allocation.weights {
                assert!((0.0..=1.0 + 1e-9).contains(&w), "weight {} out of box", w);
            }
        }
    }

    #[test]
    fn test_beats_equal_weights() {
        let input = three_assets();
        let allocation = optimize(&input).unwrap();

        let aligned = align(&input);
        let sigma = covariance(&aligned).unwrap();
        let mu: Vec<f64> = aligned.iter().map(|s| s.mean().unwrap()).collect();
        let equal = vec![1.0 / 3.0; 3];
        let equal_sharpe = sharpe(&equal, &mu, &sigma).unwrap();

        assert!(allocation.sharpe_ratio >= equal_sharpe - 1e-9);
    }

    #[test]
    fn test_identical_series_is_singular() {
        let a = series(&[0.01, -0.02, 0.015, -0.005, 0.02]);
        let result = optimize(&[a.clone(), a]);
        assert!(matches!(result, Err(OptimizeError::SingularCovariance)));
    }

    #[test]
    fn test_mirrored_series_is_singular() {
        let a = series(&[0.01, -0.02, 0.015, -0.005, 0.02]);
        let mirrored = ReturnSeries::new(a.values.iter().map(|r| -r).collect());
        let result = optimize(&[a, mirrored]);
        assert!(matches!(result, Err(OptimizeError::SingularCovariance)));
    }

    #[test]
    fn test_too_few_assets() {
        assert!(matches!(
            optimize(&[series(&[0.01, 0.02, 0.03])]),
            Err(OptimizeError::TooFewAssets(1))
        ));
        assert!(matches!(
            optimize(&[series(&[0.01, 0.02]), series(&[0.01])]),
            Err(OptimizeError::TooFewAssets(1))
        ));
        assert!(matches!(optimize(&[]), Err(OptimizeError::TooFewAssets(0))));
    }

    #[test]
    fn test_higher_sharpe_asset_dominates() {
        // Same volatility profile, one asset with clearly higher mean.
        let strong: Vec<f64> = (0..60)
            .map(|i| 0.002 + 0.015 * ((i as f64) * 0.9).sin())
            .collect();
        let weak: Vec<f64> = (0..60)
            .map(|i| 0.0001 + 0.015 * ((i as f64) * 0.53 + 0.7).cos())
            .collect();
        let allocation = optimize(&[series(&strong), series(&weak)]).unwrap();
        assert!(allocation.weights[0] > allocation.weights[1]);
    }

    #[test]
    fn test_inversion_roundtrip() {
        let matrix = vec![vec![2.0, 1.0], vec![5.0, 3.0]];
        let inverse = invert(&matrix, 1e-12).unwrap();
        // A · A⁻¹ = I
        for i in 0..2 {
            for j in 0..2 {
                let cell: f64 = (0..2).map(|k| matrix[i][k] * inverse[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(cell, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let matrix = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(invert(&matrix, 1e-12).is_none());
    }

    #[test]
    fn test_projection_clamps_and_normalizes() {
        let projected = project(vec![-0.2, 0.8, 0.6]).unwrap();
        assert_eq!(projected[0], 0.0);
        assert_relative_eq!(projected.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
