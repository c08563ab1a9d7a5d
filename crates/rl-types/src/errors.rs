use thiserror::Error;

/// Main error type for the Riskline system
#[derive(Error, Debug)]
pub enum RlError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Optimization error: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Price-history errors raised at the provider boundary
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Insufficient data for {symbol}: {message}")]
    InsufficientData { symbol: String, message: String },

    #[error("Invalid close price {value} for {symbol}: prices must be positive")]
    InvalidPrice { symbol: String, value: f64 },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// Request-shape errors, rejected before any computation
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("No symbols supplied")]
    NoSymbols,

    #[error("Shape mismatch: {symbols} symbols but {weights} weights")]
    ShapeMismatch { symbols: usize, weights: usize },

    #[error("Negative weight {weight} for {symbol}")]
    NegativeWeight { symbol: String, weight: f64 },

    #[error("Weights sum to zero; at least one weight must be positive")]
    ZeroWeights,

    #[error("Confidence level must lie in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("Horizon must be at least 1 trading day, got {0}")]
    InvalidHorizon(u32),
}

/// Optimizer failures, distinct from per-metric numeric degeneracy
#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("At least 2 securities with usable return data required, got {0}")]
    TooFewAssets(usize),

    #[error("Covariance matrix is singular; assets may be perfectly correlated")]
    SingularCovariance,

    #[error("Solver did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("Optimization produced degenerate weights")]
    DegenerateWeights,
}

/// Result type alias for Riskline operations
pub type RlResult<T> = Result<T, RlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RequestError::ShapeMismatch {
            symbols: 3,
            weights: 2,
        };

        assert!(error.to_string().contains("Shape mismatch"));
        assert!(error.to_string().contains('3'));
        assert!(error.to_string().contains('2'));
    }

    #[test]
    fn test_error_conversion() {
        let data_error = DataError::InsufficientData {
            symbol: "AAPL".to_string(),
            message: "1 close".to_string(),
        };
        let rl_error: RlError = data_error.into();

        match rl_error {
            RlError::Data(_) => (),
            _ => panic!("Expected Data error"),
        }
    }

    #[test]
    fn test_optimize_error_variants_are_distinct() {
        let singular = OptimizeError::SingularCovariance.to_string();
        let nonconv = OptimizeError::NonConvergence { iterations: 500 }.to_string();
        assert_ne!(singular, nonconv);
        assert!(nonconv.contains("500"));
    }
}
