use crate::errors::{EngineError, EngineResult};
use crate::models::volatility::HistoricalSeries;
use std::path::{Path, PathBuf};

/// Anything that can hand the engine a chronological price history.
pub trait PriceSource {
    fn name(&self) -> String;

    fn load(&self) -> EngineResult<HistoricalSeries>;
}

/// Plain-text price file: numbers separated by commas and/or whitespace,
/// oldest first. Non-numeric tokens (headers, tickers) are skipped.
#[derive(Debug, Clone)]
pub struct FilePriceSource {
    path: PathBuf,
}

impl FilePriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PriceSource for FilePriceSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> EngineResult<HistoricalSeries> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| EngineError::Io(format!("{}: {e}", self.path.display())))?;

        let prices = parse_prices(&raw);
        if prices.is_empty() {
            return Err(EngineError::Parse(format!(
                "no numeric prices found in {}",
                self.path.display()
            )));
        }

        tracing::info!(
            source = %self.path.display(),
            observations = prices.len(),
            "loaded price history"
        );
        HistoricalSeries::new(prices)
    }
}

/// Split on commas and whitespace; keep every token that parses as a finite f64.
pub fn parse_prices(raw: &str) -> Vec<f64> {
    let mut cleaned = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => cleaned.push(value),
            _ => tracing::warn!(token, "ignoring non-numeric token"),
        }
    }
    cleaned
}
