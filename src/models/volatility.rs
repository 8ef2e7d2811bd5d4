use crate::errors::{EngineError, EngineResult};
use serde::Serialize;

/// Days per year used wherever a daily quantity is annualized.
pub const ANNUALIZATION_DAYS: f64 = 365.0;

/// Chronological, strictly positive price history. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    prices: Vec<f64>,
}

impl HistoricalSeries {
    /// At least two finite, positive prices.
    pub fn new(prices: Vec<f64>) -> EngineResult<Self> {
        if prices.len() < 2 {
            return Err(EngineError::InsufficientData { needed: 2, got: prices.len() });
        }
        for &p in &prices {
            if !p.is_finite() || p <= 0.0 {
                return Err(EngineError::invalid("price", p, "prices must be finite and positive"));
            }
        }
        Ok(Self { prices })
    }

    #[inline]
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Most recent observation, the natural simulation spot.
    #[inline]
    pub fn last(&self) -> f64 {
        self.prices[self.prices.len() - 1]
    }

    /// r_t = ln(P_t / P_{t-1}), length n-1.
    pub fn log_returns(&self) -> Vec<f64> {
        self.prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
    }
}

/// Daily-step GBM calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GbmParameters {
    /// Mean log return with the Ito correction applied.
    pub daily_drift: f64,
    pub daily_volatility: f64,
}

impl GbmParameters {
    #[inline]
    pub fn annualized_volatility(&self) -> f64 {
        self.daily_volatility * ANNUALIZATION_DAYS.sqrt()
    }
}

/// sigma = sample std (n-1) of log returns; mu = mean(log returns) - sigma^2/2.
pub fn daily_vol_and_drift(series: &HistoricalSeries) -> EngineResult<GbmParameters> {
    let returns = series.log_returns();
    if returns.len() < 2 {
        return Err(EngineError::InsufficientData { needed: 3, got: series.len() });
    }

    let sigma = sample_variance(&returns).sqrt();
    let mu = mean(&returns) - 0.5 * sigma * sigma;

    tracing::debug!(
        observations = series.len(),
        daily_drift = mu,
        daily_volatility = sigma,
        "estimated GBM parameters"
    );

    Ok(GbmParameters { daily_drift: mu, daily_volatility: sigma })
}

/// Historical volatility scaled to annual terms: sigma_daily * sqrt(365).
pub fn annualized_volatility(series: &HistoricalSeries) -> EngineResult<f64> {
    daily_vol_and_drift(series).map(|p| p.annualized_volatility())
}

// ── Moment helpers shared with the Heston calibration ──

#[inline]
pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Bessel-corrected variance. Caller guarantees n >= 2.
pub(crate) fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let m = mean(data);
    let mut var_sum = 0.0;
    for &x in data {
        let d = x - m;
        var_sum += d * d;
    }
    var_sum / (n - 1.0)
}

/// Divisor-n standard deviation.
pub(crate) fn population_std(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let m = mean(data);
    let mut var_sum = 0.0;
    for &x in data {
        let d = x - m;
        var_sum += d * d;
    }
    (var_sum / n).sqrt()
}
