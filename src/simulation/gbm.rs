use crate::errors::{ensure_finite, EngineError, EngineResult};
use crate::models::volatility::GbmParameters;
use crate::simulation::{path_seed, PathEnsemble, PathSimulator, SimulationConfig, SimulationRun};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Daily-step geometric Brownian motion.
///
/// S_t = S_{t-1} * exp(mu + sigma * z),  z ~ N(0, 1)
///
/// mu and sigma are already per-day (see `daily_vol_and_drift`), so there is
/// no sqrt(dt) scaling: one column is one day.
#[derive(Debug, Clone, Copy)]
pub struct GbmSimulator {
    params: GbmParameters,
}

impl GbmSimulator {
    pub fn new(params: GbmParameters) -> EngineResult<Self> {
        ensure_finite("daily_drift", params.daily_drift)?;
        ensure_finite("daily_volatility", params.daily_volatility)?;
        if params.daily_volatility < 0.0 {
            return Err(EngineError::invalid(
                "daily_volatility",
                params.daily_volatility,
                "must be non-negative",
            ));
        }
        Ok(Self { params })
    }

    #[inline]
    pub fn params(&self) -> &GbmParameters {
        &self.params
    }
}

impl PathSimulator for GbmSimulator {
    #[inline]
    fn name(&self) -> &'static str {
        "GBM"
    }

    fn simulate(&self, s0: f64, config: &SimulationConfig) -> EngineResult<SimulationRun> {
        config.validate(s0)?;

        let seed = config.resolve_seed();
        let steps = config.days;
        let mu = self.params.daily_drift;
        let sigma = self.params.daily_volatility;

        tracing::debug!(
            seed,
            paths = config.replications,
            steps,
            mu,
            sigma,
            "running GBM simulation"
        );

        let mut data = vec![0.0_f64; config.replications * steps];
        data.par_chunks_mut(steps).enumerate().for_each(|(p, row)| {
            let mut rng = StdRng::seed_from_u64(path_seed(seed, p));
            let mut s = s0;
            row[0] = s;
            for cell in row.iter_mut().skip(1) {
                let z: f64 = rng.sample(StandardNormal);
                s *= (mu + sigma * z).exp();
                *cell = s;
            }
        });

        Ok(SimulationRun {
            seed,
            prices: PathEnsemble::from_raw(config.replications, steps, data),
            variances: None,
        })
    }
}

/// Convenience: simulate `replications` GBM paths of `days` columns.
pub fn simulate_gbm(
    s0: f64,
    days: usize,
    replications: usize,
    params: GbmParameters,
    seed: Option<u64>,
) -> EngineResult<PathEnsemble> {
    let config = SimulationConfig { days, replications, seed };
    GbmSimulator::new(params)?.simulate(s0, &config).map(|run| run.prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(mu: f64, sigma: f64) -> GbmParameters {
        GbmParameters { daily_drift: mu, daily_volatility: sigma }
    }

    #[test]
    fn test_shape_and_initial_column() {
        let e = simulate_gbm(250.0, 11, 40, params(0.001, 0.02), Some(1)).unwrap();
        assert_eq!(e.paths(), 40);
        assert_eq!(e.steps(), 11);
        assert!(e.column(0).all(|s| s == 250.0));
        assert!(e.rows().flatten().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn test_one_day_log_return_moments() {
        let e = simulate_gbm(100.0, 2, 100_000, params(0.0, 0.01), Some(42)).unwrap();
        let logs: Vec<f64> = e.terminal_values().iter().map(|s| (s / 100.0).ln()).collect();

        let n = logs.len() as f64;
        let mean = logs.iter().sum::<f64>() / n;
        let var = logs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert!(mean.abs() < 0.002, "log mean {mean} should be ~0");
        assert!((var.sqrt() - 0.01).abs() < 0.002, "log std {} should be ~0.01", var.sqrt());
    }

    #[test]
    fn test_zero_vol_is_deterministic_growth() {
        let e = simulate_gbm(100.0, 5, 3, params(0.01, 0.0), None).unwrap();
        for row in e.rows() {
            for (t, &s) in row.iter().enumerate() {
                assert_relative_eq!(s, 100.0 * (0.01 * t as f64).exp(), max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_seed_reproducibility() {
        let a = simulate_gbm(100.0, 30, 200, params(0.0, 0.02), Some(99)).unwrap();
        let b = simulate_gbm(100.0, 30, 200, params(0.0, 0.02), Some(99)).unwrap();
        let c = simulate_gbm(100.0, 30, 200, params(0.0, 0.02), Some(100)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_spot_only_run() {
        let e = simulate_gbm(100.0, 1, 5, params(0.0, 0.02), Some(3)).unwrap();
        assert_eq!(e.terminal_values(), vec![100.0; 5]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(simulate_gbm(100.0, 0, 5, params(0.0, 0.02), None).is_err());
        assert!(simulate_gbm(100.0, 5, 0, params(0.0, 0.02), None).is_err());
        assert!(simulate_gbm(-1.0, 5, 5, params(0.0, 0.02), None).is_err());
        assert!(GbmSimulator::new(params(0.0, -0.02)).is_err());
        assert!(GbmSimulator::new(params(f64::NAN, 0.02)).is_err());
    }

    fn in_pool<T: Send>(threads: usize, f: impl FnOnce() -> T + Send) -> T {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap().install(f)
    }

    #[test]
    fn test_thread_count_does_not_change_paths() {
        let run = || simulate_gbm(100.0, 30, 257, params(0.0005, 0.02), Some(4)).unwrap();
        let single = in_pool(1, run);
        let many = in_pool(7, run);
        assert_eq!(single, many);
    }

    #[test]
    fn test_unseeded_run_is_replayable_from_reported_seed() {
        let sim = GbmSimulator::new(params(0.0, 0.02)).unwrap();
        let first = sim.simulate(100.0, &SimulationConfig::new(20, 64)).unwrap();
        let replay = sim
            .simulate(100.0, &SimulationConfig::new(20, 64).with_seed(first.seed))
            .unwrap();
        assert_eq!(replay.seed, first.seed);
        assert_eq!(replay.prices, first.prices);
    }

    #[test]
    fn test_run_reports_seed() {
        let sim = GbmSimulator::new(params(0.0, 0.01)).unwrap();
        let run = sim.simulate(100.0, &SimulationConfig::new(3, 2).with_seed(11)).unwrap();
        assert_eq!(run.seed, 11);
        assert!(run.variances.is_none());
        assert_eq!(sim.name(), "GBM");
    }
}
