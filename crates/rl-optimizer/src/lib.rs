//! Portfolio weight optimization for Riskline.
//!
//! Finds the long-only, fully invested weight vector maximizing the Sharpe
//! ratio over a set of return series. Failure modes (too few assets,
//! singular covariance, non-convergence, degenerate weights) are explicit
//! [`rl_types::OptimizeError`] variants — never a silently wrong vector.

pub mod sharpe;

pub use sharpe::{optimize, optimize_with, Allocation, OptimizerConfig};
