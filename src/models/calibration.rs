//! Heston moment calibration from a daily price history.
//!
//! Proxies, not maximum likelihood:
//!   v_t   = r_t^2 * 365                      (instantaneous variance)
//!   mu    = mean(r) * 365
//!   theta = mean(v)
//!   v0    = v_T
//!   kappa = (1 - b) * 365,  b = AR(1) slope of v_t on v_{t-1}
//!   xi    = std(diff(v)) * sqrt(365)         (divisor n)
//!   rho   = corr(r[1:], diff(v))
//!
//! kappa and rho fall back to fixed heuristics when the series is too short
//! or degenerate; the fallback is tagged, never silent.

use crate::errors::{EngineError, EngineResult};
use crate::models::volatility::{mean, population_std, HistoricalSeries, ANNUALIZATION_DAYS};
use serde::Serialize;

/// Mean-reversion speed used when the AR(1) regression is undefined.
pub const KAPPA_FALLBACK: f64 = 1.0;

/// Price/variance correlation used when too few variance changes exist.
pub const RHO_FALLBACK: f64 = -0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    TooFewObservations { needed: usize, got: usize },
    ZeroVariance,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewObservations { needed, got } => {
                write!(f, "too few observations ({got} < {needed})")
            }
            Self::ZeroVariance => write!(f, "zero variance in regressor"),
        }
    }
}

/// A calibrated scalar that remembers whether it came from data or a default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Estimate {
    Estimated { value: f64 },
    Fallback { value: f64, reason: FallbackReason },
}

impl Estimate {
    #[inline]
    pub fn value(&self) -> f64 {
        match *self {
            Self::Estimated { value } | Self::Fallback { value, .. } => value,
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    #[inline]
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match *self {
            Self::Fallback { reason, .. } => Some(reason),
            Self::Estimated { .. } => None,
        }
    }
}

/// Plain Heston coefficients, as consumed by the simulator.
/// Annualized; variances in annual units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HestonParameters {
    pub mu: f64,
    pub kappa: f64,
    pub theta: f64,
    pub xi: f64,
    pub rho: f64,
    pub v0: f64,
}

/// Estimator output: kappa and rho carry their provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HestonCalibration {
    pub mu: f64,
    pub kappa: Estimate,
    pub theta: f64,
    pub xi: f64,
    pub rho: Estimate,
    pub v0: f64,
}

impl HestonCalibration {
    pub fn parameters(&self) -> HestonParameters {
        HestonParameters {
            mu: self.mu,
            kappa: self.kappa.value(),
            theta: self.theta,
            xi: self.xi,
            rho: self.rho.value(),
            v0: self.v0,
        }
    }

    #[inline]
    pub fn uses_fallback(&self) -> bool {
        self.kappa.is_fallback() || self.rho.is_fallback()
    }

    /// Named fallbacks, e.g. for a report.
    pub fn fallbacks(&self) -> Vec<(&'static str, FallbackReason)> {
        let mut out = Vec::new();
        if let Some(reason) = self.kappa.fallback_reason() {
            out.push(("kappa", reason));
        }
        if let Some(reason) = self.rho.fallback_reason() {
            out.push(("rho", reason));
        }
        out
    }
}

/// Calibrate the five Heston parameters (plus drift) from a price history.
/// Needs at least 3 prices so that one variance difference exists for xi.
pub fn heston_parameters(series: &HistoricalSeries) -> EngineResult<HestonCalibration> {
    if series.len() < 3 {
        return Err(EngineError::InsufficientData { needed: 3, got: series.len() });
    }

    let log_ret = series.log_returns();
    let variances: Vec<f64> = log_ret.iter().map(|r| r * r * ANNUALIZATION_DAYS).collect();

    let mu = mean(&log_ret) * ANNUALIZATION_DAYS;
    let theta = mean(&variances);
    let v0 = variances[variances.len() - 1];
    let kappa = estimate_kappa(&variances);

    let d_v: Vec<f64> = variances.windows(2).map(|w| w[1] - w[0]).collect();
    let xi = population_std(&d_v) * ANNUALIZATION_DAYS.sqrt();
    let rho = estimate_rho(&log_ret[1..], &d_v);

    let calibration = HestonCalibration { mu, kappa, theta, xi, rho, v0 };

    for (name, reason) in calibration.fallbacks() {
        tracing::warn!(parameter = name, %reason, "heston estimate fell back to default");
    }
    tracing::debug!(
        mu,
        kappa = kappa.value(),
        theta,
        xi,
        rho = rho.value(),
        v0,
        "estimated Heston parameters"
    );

    Ok(calibration)
}

/// AR(1) slope b of v_t on v_{t-1}; kappa = (1 - b) * 365.
fn estimate_kappa(variances: &[f64]) -> Estimate {
    if variances.len() < 2 {
        return Estimate::Fallback {
            value: KAPPA_FALLBACK,
            reason: FallbackReason::TooFewObservations { needed: 2, got: variances.len() },
        };
    }

    let x = &variances[..variances.len() - 1];
    let y = &variances[1..];
    let x_mean = mean(x);
    let y_mean = mean(y);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (&xv, &yv) in x.iter().zip(y) {
        let dx = xv - x_mean;
        numerator += dx * (yv - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        return Estimate::Fallback { value: KAPPA_FALLBACK, reason: FallbackReason::ZeroVariance };
    }

    let b = numerator / denominator;
    Estimate::Estimated { value: (1.0 - b) * ANNUALIZATION_DAYS }
}

/// Pearson correlation of returns against variance changes.
fn estimate_rho(returns: &[f64], d_v: &[f64]) -> Estimate {
    if d_v.len() < 2 {
        return Estimate::Fallback {
            value: RHO_FALLBACK,
            reason: FallbackReason::TooFewObservations { needed: 2, got: d_v.len() },
        };
    }

    let a_mean = mean(returns);
    let b_mean = mean(d_v);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&a, &b) in returns.iter().zip(d_v) {
        let da = a - a_mean;
        let db = b - b_mean;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Estimate::Fallback { value: RHO_FALLBACK, reason: FallbackReason::ZeroVariance };
    }

    Estimate::Estimated { value: cov / (var_a * var_b).sqrt() }
}
