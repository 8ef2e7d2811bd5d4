pub mod gbm;
pub mod heston;

use crate::errors::{ensure_positive, EngineError, EngineResult};
use serde::Serialize;

/// Stride between per-path seeds. Prime, so neighbouring bases don't collide.
const PATH_SEED_STRIDE: u64 = 7_919;

/// Simulated values indexed [path, step], stored row-major.
///
/// Step 0 is the initial state; the last column is the terminal distribution.
/// Never mutated after the simulator hands it out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEnsemble {
    paths: usize,
    steps: usize,
    data: Vec<f64>,
}

impl PathEnsemble {
    pub(crate) fn from_raw(paths: usize, steps: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), paths * steps);
        Self { paths, steps, data }
    }

    #[inline]
    pub fn paths(&self) -> usize {
        self.paths
    }

    /// Columns per path, including step 0.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// One full path, or None if `index` is out of range.
    #[inline]
    pub fn path(&self, index: usize) -> Option<&[f64]> {
        if index >= self.paths {
            return None;
        }
        let start = index * self.steps;
        self.data.get(start..start + self.steps)
    }

    #[inline]
    pub fn value(&self, path: usize, step: usize) -> Option<f64> {
        if path >= self.paths || step >= self.steps {
            return None;
        }
        self.data.get(path * self.steps + step).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.steps)
    }

    /// All paths at one time step.
    ///
    /// # Panics
    ///
    /// Panics if `step >= self.steps()`.
    pub fn column(&self, step: usize) -> impl Iterator<Item = f64> + '_ {
        assert!(step < self.steps, "step {step} out of range (steps={})", self.steps);
        self.data.iter().skip(step).step_by(self.steps).copied()
    }

    /// Last column. Simulators never hand out an ensemble with zero steps.
    pub fn terminal_values(&self) -> Vec<f64> {
        self.column(self.steps - 1).collect()
    }
}

/// Run shape shared by both simulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    /// Columns per path, including the step-0 spot.
    pub days: usize,
    pub replications: usize,
    /// None draws a fresh base seed per run; it is reported back either way.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(days: usize, replications: usize) -> Self {
        Self { days, replications, seed: None }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed: Some(seed), ..self }
    }

    pub(crate) fn validate(&self, s0: f64) -> EngineResult<()> {
        ensure_positive("s0", s0)?;
        if self.days == 0 {
            return Err(EngineError::invalid("days", 0.0, "must include at least step 0"));
        }
        if self.replications == 0 {
            return Err(EngineError::invalid("replications", 0.0, "must be at least 1"));
        }
        self.days
            .checked_mul(self.replications)
            .ok_or_else(|| EngineError::Simulation("path matrix size overflows usize".into()))?;
        Ok(())
    }

    pub(crate) fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random::<u64>)
    }
}

/// Output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRun {
    pub seed: u64,
    pub prices: PathEnsemble,
    /// Present for stochastic-volatility models.
    pub variances: Option<PathEnsemble>,
}

/// Monte Carlo path generators implement this trait.
/// Given the same config (with seed), `simulate` must return identical paths
/// regardless of how many threads rayon uses.
pub trait PathSimulator: Send + Sync {
    fn name(&self) -> &'static str;

    fn simulate(&self, s0: f64, config: &SimulationConfig) -> EngineResult<SimulationRun>;
}

/// Private, reproducible RNG stream seed for path `index`.
#[inline]
pub(crate) fn path_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(PATH_SEED_STRIDE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PathEnsemble {
        // 3 paths x 4 steps
        PathEnsemble::from_raw(
            3,
            4,
            vec![
                1.0, 2.0, 3.0, 4.0, //
                1.0, 0.5, 0.25, 0.125, //
                1.0, 1.0, 1.0, 1.0,
            ],
        )
    }

    #[test]
    fn test_indexing() {
        let e = sample();
        assert_eq!(e.paths(), 3);
        assert_eq!(e.steps(), 4);
        assert_eq!(e.path(1), Some(&[1.0, 0.5, 0.25, 0.125][..]));
        assert_eq!(e.value(0, 3), Some(4.0));
        assert_eq!(e.column(1).collect::<Vec<_>>(), vec![2.0, 0.5, 1.0]);
        assert_eq!(e.terminal_values(), vec![4.0, 0.125, 1.0]);
        assert_eq!(e.rows().count(), 3);
    }

    #[test]
    fn test_out_of_range_lookups_return_none() {
        let e = sample();
        assert_eq!(e.path(3), None);
        assert_eq!(e.value(3, 0), None);
        // Step past the row end must not wrap into the next path
        assert_eq!(e.value(0, 4), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_column_out_of_range_panics() {
        let _ = sample().column(4);
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulationConfig::new(10, 5).validate(100.0).is_ok());
        assert!(SimulationConfig::new(0, 5).validate(100.0).is_err());
        assert!(SimulationConfig::new(10, 0).validate(100.0).is_err());
        assert!(SimulationConfig::new(10, 5).validate(0.0).is_err());
        assert!(SimulationConfig::new(usize::MAX, 2).validate(1.0).is_err());
    }

    #[test]
    fn test_seed_resolution() {
        let seeded = SimulationConfig::new(2, 2).with_seed(7);
        assert_eq!(seeded.resolve_seed(), 7);
        assert_ne!(path_seed(7, 0), path_seed(7, 1));
        assert_eq!(path_seed(u64::MAX, 1), PATH_SEED_STRIDE - 1);
    }
}
