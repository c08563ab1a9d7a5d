use async_trait::async_trait;
use rl_types::{DataError, RlResult};
use serde::Deserialize;
use std::path::Path;

/// Maximum trading days of history a provider returns (one year).
pub const MAX_HISTORY_DAYS: usize = 252;

/// Trait for price history providers (HTTP APIs, CSV files, fixtures).
///
/// Implementations return daily closing prices, oldest first, at most
/// [`MAX_HISTORY_DAYS`] entries. An empty result means the symbol has no
/// usable history; providers never substitute data for a failed fetch.
#[async_trait]
pub trait PriceProvider: Send + Sync + std::fmt::Debug {
    /// Check if this provider supports the given symbol
    fn supports_symbol(&self, symbol: &str) -> bool;

    /// Fetch daily closes for the symbol, oldest first
    async fn fetch_closes(&self, symbol: &str) -> RlResult<Vec<f64>>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Get provider configuration
    fn config(&self) -> serde_json::Value;
}

/// Financial Modeling Prep API provider (daily line series).
#[derive(Debug)]
pub struct FmpProvider {
    pub name: String,
    pub api_key: String,
    pub client: reqwest::Client,
}

impl FmpProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            name: "Financial Modeling Prep".to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Parse the `historical-price-full` response: entries arrive newest
    /// first; keep the most recent [`MAX_HISTORY_DAYS`] and reverse to
    /// chronological order.
    fn parse_historical_response(&self, response: serde_json::Value) -> RlResult<Vec<f64>> {
        let historical = match response.get("historical").and_then(|h| h.as_array()) {
            Some(entries) => entries,
            // No history block is a valid "nothing to report" answer.
            None => return Ok(Vec::new()),
        };

        let mut closes = Vec::with_capacity(historical.len().min(MAX_HISTORY_DAYS));
        for entry in historical.iter().take(MAX_HISTORY_DAYS) {
            let close = entry
                .get("close")
                .and_then(|c| c.as_f64())
                .ok_or_else(|| DataError::ParseError {
                    message: "Missing or non-numeric 'close' in historical entry".to_string(),
                })?;
            closes.push(close);
        }

        closes.reverse();
        Ok(closes)
    }
}

#[async_trait]
impl PriceProvider for FmpProvider {
    fn supports_symbol(&self, symbol: &str) -> bool {
        !symbol.is_empty() && !self.api_key.is_empty()
    }

    async fn fetch_closes(&self, symbol: &str) -> RlResult<Vec<f64>> {
        tracing::info!("Fetching price history from FMP for {}", symbol);

        let url = format!(
            "https://financialmodelingprep.com/api/v3/historical-price-full/{}?serietype=line&apikey={}",
            symbol, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::LoadingFailed {
                message: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(DataError::LoadingFailed {
                message: format!("HTTP error: {}", response.status()),
            }
            .into());
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to parse JSON response: {}", e),
            })?;

        if let Some(error) = json.get("Error Message") {
            return Err(DataError::LoadingFailed {
                message: format!("API error: {}", error),
            }
            .into());
        }

        let closes = self.parse_historical_response(json)?;
        tracing::info!("Retrieved {} closes from FMP for {}", closes.len(), symbol);
        Ok(closes)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "fmp",
            "api_key_set": !self.api_key.is_empty()
        })
    }
}

/// CSV provider for loading local price files
#[derive(Debug)]
pub struct CsvPriceProvider {
    pub name: String,
    pub data_directory: std::path::PathBuf,
    pub file_pattern: String,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date")]
    date: String,
    #[serde(alias = "Close", alias = "close")]
    close: f64,
}

impl CsvPriceProvider {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            name: "CSV Provider".to_string(),
            data_directory: data_directory.as_ref().to_path_buf(),
            file_pattern: "{symbol}.csv".to_string(),
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.file_pattern = pattern.to_string();
        self
    }

    fn get_file_path(&self, symbol: &str) -> std::path::PathBuf {
        let filename = self.file_pattern.replace("{symbol}", symbol);
        self.data_directory.join(filename)
    }
}

#[async_trait]
impl PriceProvider for CsvPriceProvider {
    fn supports_symbol(&self, symbol: &str) -> bool {
        self.get_file_path(symbol).exists()
    }

    async fn fetch_closes(&self, symbol: &str) -> RlResult<Vec<f64>> {
        let file_path = self.get_file_path(symbol);

        if !file_path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let file = std::fs::File::open(&file_path)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut rows: Vec<(chrono::NaiveDate, f64)> = Vec::new();
        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError {
                message: format!("CSV parsing error: {}", e),
            })?;

            let date = chrono::NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").map_err(
                |e| DataError::ParseError {
                    message: format!("Date parsing error for '{}': {}", record.date, e),
                },
            )?;
            rows.push((date, record.close));
        }

        rows.sort_by_key(|(date, _)| *date);

        // Keep the most recent year of history.
        let skip = rows.len().saturating_sub(MAX_HISTORY_DAYS);
        Ok(rows.into_iter().skip(skip).map(|(_, close)| close).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "csv",
            "directory": self.data_directory,
            "pattern": self.file_pattern
        })
    }
}

/// Deterministic synthetic price provider for demos and tests.
///
/// Synthetic data is an explicit, opt-in policy of this provider; the
/// engine never falls back to it when a real fetch fails.
#[derive(Debug)]
pub struct SyntheticProvider {
    pub name: String,
    pub days: usize,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            name: "Synthetic Provider".to_string(),
            days: MAX_HISTORY_DAYS,
        }
    }

    pub fn with_days(mut self, days: usize) -> Self {
        self.days = days.min(MAX_HISTORY_DAYS);
        self
    }

    fn seed_for(symbol: &str) -> u64 {
        // Stable per-symbol seed so repeated fetches agree.
        symbol
            .bytes()
            .fold(0xcafe_f00du64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for SyntheticProvider {
    fn supports_symbol(&self, symbol: &str) -> bool {
        !symbol.is_empty()
    }

    async fn fetch_closes(&self, symbol: &str) -> RlResult<Vec<f64>> {
        let mut rng_state = Self::seed_for(symbol); // Simple PRNG
        let mut price = 100.0;
        let mut closes = Vec::with_capacity(self.days);

        for _ in 0..self.days {
            // Simple random walk
            rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
            let random = ((rng_state >> 16) & 0xFFFF) as f64 / 65536.0 - 0.5; // -0.5 to 0.5
            price *= 1.0 + random * 0.02; // ±1% daily move
            closes.push(price);
        }

        Ok(closes)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "synthetic",
            "days": self.days
        })
    }
}
