use crate::errors::{ensure_finite, EngineError, EngineResult};
use crate::models::calibration::HestonParameters;
use crate::models::volatility::ANNUALIZATION_DAYS;
use crate::simulation::{path_seed, PathEnsemble, PathSimulator, SimulationConfig, SimulationRun};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// One calendar day in years.
const DT: f64 = 1.0 / ANNUALIZATION_DAYS;

/// Heston stochastic volatility, full-truncation Euler.
///
/// Per step, with V+ = max(V_{t-1}, 0):
///   V_t = V+ + kappa*(theta - V+)*dt + xi*sqrt(V+ dt)*Z_vol
///   S_t = S_{t-1} * exp((mu - V+/2)*dt + sqrt(V+ dt)*Z_price)
///
/// Z_price = W1, Z_vol = rho*W1 + sqrt(1 - rho^2)*W2.
///
/// Only V_{t-1} is clamped. The stored V_t may go negative; that bias is part
/// of the discretization the calibration assumes and must not be removed.
#[derive(Debug, Clone, Copy)]
pub struct HestonSimulator {
    params: HestonParameters,
}

/// Price and variance ensembles from one Heston run.
#[derive(Debug, Clone, PartialEq)]
pub struct HestonPaths {
    pub seed: u64,
    pub prices: PathEnsemble,
    pub variances: PathEnsemble,
}

impl HestonSimulator {
    pub fn new(params: HestonParameters) -> EngineResult<Self> {
        ensure_finite("mu", params.mu)?;
        ensure_finite("kappa", params.kappa)?;
        ensure_finite("theta", params.theta)?;
        ensure_finite("xi", params.xi)?;
        ensure_finite("rho", params.rho)?;
        ensure_finite("v0", params.v0)?;
        if params.xi < 0.0 {
            return Err(EngineError::invalid("xi", params.xi, "vol-of-vol must be non-negative"));
        }
        if !(-1.0..=1.0).contains(&params.rho) {
            return Err(EngineError::invalid("rho", params.rho, "correlation must lie in [-1, 1]"));
        }
        if params.v0 < 0.0 {
            return Err(EngineError::invalid("v0", params.v0, "initial variance must be non-negative"));
        }
        Ok(Self { params })
    }

    #[inline]
    pub fn params(&self) -> &HestonParameters {
        &self.params
    }

    pub fn simulate_paths(&self, s0: f64, config: &SimulationConfig) -> EngineResult<HestonPaths> {
        config.validate(s0)?;

        let seed = config.resolve_seed();
        let steps = config.days;
        let HestonParameters { mu, kappa, theta, xi, rho, v0 } = self.params;
        let rho_bar = (1.0 - rho * rho).sqrt();

        tracing::debug!(
            seed,
            paths = config.replications,
            steps,
            kappa,
            theta,
            xi,
            rho,
            "running Heston simulation"
        );

        let mut prices = vec![0.0_f64; config.replications * steps];
        let mut variances = vec![0.0_f64; config.replications * steps];

        prices
            .par_chunks_mut(steps)
            .zip(variances.par_chunks_mut(steps))
            .enumerate()
            .for_each(|(p, (s_row, v_row))| {
                let mut rng = StdRng::seed_from_u64(path_seed(seed, p));
                s_row[0] = s0;
                v_row[0] = v0;

                for t in 1..steps {
                    let w1: f64 = rng.sample(StandardNormal);
                    let w2: f64 = rng.sample(StandardNormal);
                    let z_price = w1;
                    let z_vol = rho * w1 + rho_bar * w2;

                    // Full truncation: only the clamped value drives the step
                    let v_prev = v_row[t - 1].max(0.0);
                    let diffusion = (v_prev * DT).sqrt();

                    v_row[t] = v_prev + kappa * (theta - v_prev) * DT + xi * diffusion * z_vol;
                    s_row[t] = s_row[t - 1] * ((mu - 0.5 * v_prev) * DT + diffusion * z_price).exp();
                }
            });

        Ok(HestonPaths {
            seed,
            prices: PathEnsemble::from_raw(config.replications, steps, prices),
            variances: PathEnsemble::from_raw(config.replications, steps, variances),
        })
    }
}

impl PathSimulator for HestonSimulator {
    #[inline]
    fn name(&self) -> &'static str {
        "Heston"
    }

    fn simulate(&self, s0: f64, config: &SimulationConfig) -> EngineResult<SimulationRun> {
        let paths = self.simulate_paths(s0, config)?;
        Ok(SimulationRun {
            seed: paths.seed,
            prices: paths.prices,
            variances: Some(paths.variances),
        })
    }
}

/// Convenience: simulate `replications` Heston paths of `days` columns.
pub fn simulate_heston(
    s0: f64,
    params: HestonParameters,
    days: usize,
    replications: usize,
    seed: Option<u64>,
) -> EngineResult<HestonPaths> {
    let config = SimulationConfig { days, replications, seed };
    HestonSimulator::new(params)?.simulate_paths(s0, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> HestonParameters {
        HestonParameters { mu: 0.05, kappa: 2.0, theta: 0.04, xi: 0.3, rho: -0.7, v0: 0.04 }
    }

    fn column_mean(e: &PathEnsemble, step: usize) -> f64 {
        e.column(step).sum::<f64>() / e.paths() as f64
    }

    #[test]
    fn test_shape_and_initial_state() {
        let run = simulate_heston(100.0, params(), 31, 50, Some(5)).unwrap();
        assert_eq!(run.prices.paths(), 50);
        assert_eq!(run.prices.steps(), 31);
        assert_eq!(run.variances.steps(), 31);
        assert!(run.prices.column(0).all(|s| s == 100.0));
        assert!(run.variances.column(0).all(|v| v == 0.04));
        assert!(run.prices.rows().flatten().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn test_variance_mean_reverts_to_theta() {
        let p = HestonParameters { mu: 0.0, kappa: 5.0, theta: 0.04, xi: 0.3, rho: -0.5, v0: 0.25 };
        let run = simulate_heston(100.0, p, 365, 10_000, Some(2024)).unwrap();

        let start = column_mean(&run.variances, 1);
        let month = column_mean(&run.variances, 30);
        let end = column_mean(&run.variances, 364);

        // E[V_t] = theta + (v0 - theta) * exp(-kappa t)
        assert!((start - 0.25).abs() < 0.01, "day-1 mean {start} should be near v0");
        assert!(month < start && month > 0.04, "day-30 mean {month} should sit between v0 and theta");
        assert!((end - 0.04).abs() < 0.01, "terminal mean variance {end} should be near theta");
    }

    #[test]
    fn test_zero_vol_of_vol_at_theta_is_constant() {
        let p = HestonParameters { mu: 0.0, kappa: 3.0, theta: 0.09, xi: 0.0, rho: 0.0, v0: 0.09 };
        let run = simulate_heston(50.0, p, 20, 10, Some(8)).unwrap();
        for row in run.variances.rows() {
            for &v in row {
                assert_relative_eq!(v, 0.09, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_full_truncation_allows_negative_stored_variance() {
        let p = HestonParameters { mu: 0.0, kappa: 0.1, theta: 0.01, xi: 2.0, rho: 0.0, v0: 0.0001 };
        let run = simulate_heston(100.0, p, 50, 1_000, Some(17)).unwrap();

        assert!(
            run.variances.rows().flatten().any(|v| *v < 0.0),
            "large vol-of-vol should push some stored variances below zero"
        );
        // Clamping keeps the price update well defined
        assert!(run.prices.rows().flatten().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn test_perfect_correlation_is_valid() {
        let p = HestonParameters { rho: 1.0, ..params() };
        assert!(simulate_heston(100.0, p, 10, 10, Some(1)).is_ok());
        let p = HestonParameters { rho: -1.0, ..params() };
        assert!(simulate_heston(100.0, p, 10, 10, Some(1)).is_ok());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let bad_rho = HestonParameters { rho: 1.2, ..params() };
        assert!(matches!(
            HestonSimulator::new(bad_rho),
            Err(EngineError::InvalidParameter { name: "rho", .. })
        ));
        assert!(HestonSimulator::new(HestonParameters { xi: -0.1, ..params() }).is_err());
        assert!(HestonSimulator::new(HestonParameters { v0: -0.1, ..params() }).is_err());
        assert!(HestonSimulator::new(HestonParameters { kappa: f64::NAN, ..params() }).is_err());
        assert!(simulate_heston(100.0, params(), 0, 10, None).is_err());
    }

    #[test]
    fn test_seed_reproducibility() {
        let a = simulate_heston(100.0, params(), 60, 300, Some(77)).unwrap();
        let b = simulate_heston(100.0, params(), 60, 300, Some(77)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed, 77);
    }

    fn in_pool<T: Send>(threads: usize, f: impl FnOnce() -> T + Send) -> T {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap().install(f)
    }

    #[test]
    fn test_thread_count_does_not_change_paths() {
        let run = || simulate_heston(100.0, params(), 30, 257, Some(4)).unwrap();
        let single = in_pool(1, run);
        let many = in_pool(7, run);
        assert_eq!(single, many);
    }

    #[test]
    fn test_unseeded_run_is_replayable_from_reported_seed() {
        let sim = HestonSimulator::new(params()).unwrap();
        let first = sim.simulate(100.0, &SimulationConfig::new(20, 64)).unwrap();
        let replay = sim
            .simulate(100.0, &SimulationConfig::new(20, 64).with_seed(first.seed))
            .unwrap();
        assert_eq!(replay.seed, first.seed);
        assert_eq!(replay.prices, first.prices);
        assert_eq!(replay.variances, first.variances);
    }

    #[test]
    fn test_trait_run_carries_variances() {
        let sim = HestonSimulator::new(params()).unwrap();
        let run = sim.simulate(100.0, &SimulationConfig::new(5, 4).with_seed(3)).unwrap();
        assert_eq!(sim.name(), "Heston");
        assert_eq!(run.variances.as_ref().map(|v| v.steps()), Some(5));
    }
}
