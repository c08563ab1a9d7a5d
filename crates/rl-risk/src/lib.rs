//! Risk estimation core for Riskline.
//!
//! Provides:
//! - Log-return construction from price history
//! - Four independent VaR estimators with horizon scaling
//! - Covariance-based portfolio aggregation and benchmark beta
//! - Per-series companion analytics (rolling risk, Sharpe/Sortino, MAs)

pub mod analytics;
pub mod portfolio;
pub mod returns;
pub mod var;

pub use analytics::{analyze_symbol, SymbolAnalytics};
pub use portfolio::{align, beta, covariance, portfolio_returns, portfolio_volatility, CovarianceMatrix};
pub use returns::{expected_annual_return, log_returns, TRADING_DAYS_PER_YEAR};
pub use var::{cvar_key, scale_horizon, VarCalculator, VarConfig, VarMethod};
