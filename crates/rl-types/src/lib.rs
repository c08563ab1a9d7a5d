//! Core types for the Riskline portfolio risk engine.

pub mod errors;
pub mod request;
pub mod series;

pub use errors::{DataError, OptimizeError, RequestError, RlError, RlResult};
pub use request::{
    MetricMap, OptimizeRequest, OptimizeResponse, RiskRequest, RiskResponse,
    EXPECTED_ANNUAL_RETURN_KEY, PORTFOLIO_BETA_KEY, PORTFOLIO_KEY, PORTFOLIO_VOLATILITY_KEY,
};
pub use series::{PriceSeries, ReturnSeries};
