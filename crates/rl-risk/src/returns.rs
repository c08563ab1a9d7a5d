//! Return series construction.

use rl_types::{DataError, PriceSeries, ReturnSeries};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Build log-returns `ln(p_i) - ln(p_{i-1})` from a price series.
///
/// A series with fewer than two closes yields an empty [`ReturnSeries`]
/// (insufficient data is not an exceptional condition). A non-positive
/// close is flagged as [`DataError::InvalidPrice`] — the log is undefined
/// there, and the engine never substitutes synthetic values.
pub fn log_returns(prices: &PriceSeries) -> Result<ReturnSeries, DataError> {
    if let Some(&bad) = prices.closes.iter().find(|close| **close <= 0.0) {
        return Err(DataError::InvalidPrice {
            symbol: prices.symbol.clone(),
            value: bad,
        });
    }

    if !prices.has_sufficient_history() {
        return Ok(ReturnSeries::empty());
    }

    let values = prices
        .closes
        .windows(2)
        .map(|pair| pair[1].ln() - pair[0].ln())
        .collect();

    Ok(ReturnSeries::new(values))
}

/// Annualized expected return: `mean * 252`. `None` on an empty series.
pub fn expected_annual_return(returns: &ReturnSeries) -> Option<f64> {
    returns.mean().map(|mean| mean * TRADING_DAYS_PER_YEAR)
}
