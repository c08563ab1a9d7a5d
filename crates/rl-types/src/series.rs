use serde::{Deserialize, Serialize};

/// Daily closing prices for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, closes: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            closes,
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// At least two closes are needed to form a single return.
    pub fn has_sufficient_history(&self) -> bool {
        self.closes.len() >= 2
    }
}

/// Log-returns derived from a price series; length = closes − 1.
///
/// Owned transiently by the computation that built it; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample mean; `None` on an empty series.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Sample standard deviation (n − 1 denominator); `None` below 2 observations.
    pub fn sample_std(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some(variance.sqrt())
    }

    /// Sample skewness over standardized observations; `None` when the
    /// standard deviation is zero or undefined.
    pub fn skewness(&self) -> Option<f64> {
        let (mean, std) = (self.mean()?, self.sample_std()?);
        if std == 0.0 {
            return None;
        }
        let n = self.values.len() as f64;
        Some(
            self.values
                .iter()
                .map(|r| ((r - mean) / std).powi(3))
                .sum::<f64>()
                / n,
        )
    }

    /// Excess kurtosis (kurtosis − 3); `None` under the same conditions as
    /// [`Self::skewness`].
    pub fn excess_kurtosis(&self) -> Option<f64> {
        let (mean, std) = (self.mean()?, self.sample_std()?);
        if std == 0.0 {
            return None;
        }
        let n = self.values.len() as f64;
        let kurtosis = self
            .values
            .iter()
            .map(|r| ((r - mean) / std).powi(4))
            .sum::<f64>()
            / n;
        Some(kurtosis - 3.0)
    }
}
