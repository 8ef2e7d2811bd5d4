//! Read-only reductions over a simulated ensemble.

use crate::errors::{EngineError, EngineResult};
use crate::simulation::PathEnsemble;
use serde::Serialize;
use smallvec::SmallVec;

/// Percentile used as Value-at-Risk unless configured otherwise.
pub const DEFAULT_VAR_PERCENTILE: f64 = 5.0;

/// Arithmetic mean across paths at every time step.
pub fn mean_path(ensemble: &PathEnsemble) -> Vec<f64> {
    let mut sums = vec![0.0_f64; ensemble.steps()];
    for row in ensemble.rows() {
        for (acc, &x) in sums.iter_mut().zip(row) {
            *acc += x;
        }
    }
    let n = ensemble.paths() as f64;
    sums.iter_mut().for_each(|s| *s /= n);
    sums
}

/// Linear-interpolation percentile, `p` in [0, 100].
///
/// rank = p/100 * (n - 1); the result interpolates between the two order
/// statistics bracketing `rank`.
pub fn percentile(values: &[f64], p: f64) -> EngineResult<f64> {
    if values.is_empty() {
        return Err(EngineError::InsufficientData { needed: 1, got: 0 });
    }
    if !(0.0..=100.0).contains(&p) {
        return Err(EngineError::invalid("percentile", p, "must lie in [0, 100]"));
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    Ok(percentile_of_sorted(&sorted, p))
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Fraction of values strictly above `reference_price`.
pub fn probability_of_profit(values: &[f64], reference_price: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let winners = values.iter().filter(|&&v| v > reference_price).count();
    winners as f64 / values.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentilePoint {
    pub percentile: f64,
    pub price: f64,
}

/// Scalar risk summary of the terminal distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    pub reference_price: f64,
    pub mean_terminal: f64,
    pub value_at_risk: PercentilePoint,
    /// VaR level, median and 95th percentile, ascending.
    pub percentiles: SmallVec<[PercentilePoint; 4]>,
    pub probability_of_profit: f64,
}

pub fn summarize(
    ensemble: &PathEnsemble,
    reference_price: f64,
    var_percentile: f64,
) -> EngineResult<RiskSummary> {
    if !(0.0..=100.0).contains(&var_percentile) {
        return Err(EngineError::invalid("var_percentile", var_percentile, "must lie in [0, 100]"));
    }

    let mut terminal = ensemble.terminal_values();
    let probability_of_profit = probability_of_profit(&terminal, reference_price);
    let mean_terminal = terminal.iter().sum::<f64>() / terminal.len() as f64;

    // Sort once for all percentile reads
    terminal.sort_unstable_by(f64::total_cmp);
    let value_at_risk = PercentilePoint {
        percentile: var_percentile,
        price: percentile_of_sorted(&terminal, var_percentile),
    };

    let mut levels: SmallVec<[f64; 4]> = SmallVec::from_slice(&[var_percentile, 50.0, 95.0]);
    levels.sort_unstable_by(f64::total_cmp);
    levels.dedup();
    let percentiles = levels
        .iter()
        .map(|&p| PercentilePoint { percentile: p, price: percentile_of_sorted(&terminal, p) })
        .collect();

    Ok(RiskSummary {
        reference_price,
        mean_terminal,
        value_at_risk,
        percentiles,
        probability_of_profit,
    })
}
