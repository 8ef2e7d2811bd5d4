use crate::errors::{EngineError, EngineResult};
use crate::models::black_scholes::IvSearch;
use crate::report::PricingRequest;
use crate::simulation::SimulationConfig;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub price_file: PathBuf,
    /// Defaults to the last historical price (at-the-money).
    pub strike: Option<f64>,
    pub days_to_expiry: f64,
    pub risk_free_rate: f64,
    pub market_call_price: Option<f64>,
    /// Forecast horizon in days, excluding the step-0 spot column.
    pub sim_days: usize,
    pub sim_replications: usize,
    pub sim_seed: Option<u64>,
    pub var_percentile: f64,
    pub iv_precision: f64,
    pub iv_max_iterations: usize,
    pub scenario_points: usize,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let var_percentile: f64 = env_parse_or("VAR_PERCENTILE", "5")?;
        if !(0.0..=100.0).contains(&var_percentile) {
            return Err(EngineError::Config(format!(
                "VAR_PERCENTILE: {var_percentile} outside [0, 100]"
            )));
        }

        Ok(Self {
            price_file: PathBuf::from(env_var("PRICE_FILE")?),
            strike: env_parse_opt("STRIKE")?,
            days_to_expiry: env_parse_or("DAYS_TO_EXPIRY", "30")?,
            risk_free_rate: env_parse_or("RISK_FREE_RATE", "0.045")?,
            market_call_price: env_parse_opt("MARKET_CALL_PRICE")?,
            sim_days: env_parse_or("SIM_DAYS", "30")?,
            sim_replications: env_parse_or("SIM_REPLICATIONS", "10000")?,
            sim_seed: env_parse_opt("SIM_SEED")?,
            var_percentile,
            iv_precision: env_parse_or("IV_PRECISION", "1e-5")?,
            iv_max_iterations: env_parse_or("IV_MAX_ITERATIONS", "100")?,
            scenario_points: env_parse_or("SCENARIO_POINTS", "100")?,
        })
    }

    /// Time to maturity in years.
    #[inline]
    pub fn time_to_maturity(&self) -> f64 {
        self.days_to_expiry / 365.0
    }

    pub fn pricing_request(&self) -> PricingRequest {
        PricingRequest {
            strike: self.strike,
            time_to_maturity: self.time_to_maturity(),
            risk_free_rate: self.risk_free_rate,
            market_call_price: self.market_call_price,
            iv_search: IvSearch {
                precision: self.iv_precision,
                max_iterations: self.iv_max_iterations,
            },
            scenario_points: self.scenario_points,
        }
    }

    /// Path shape: the spot column plus `sim_days` forecast days.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            days: self.sim_days.saturating_add(1),
            replications: self.sim_replications,
            seed: self.sim_seed,
        }
    }
}

fn env_var(key: &str) -> EngineResult<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("missing env var: {key}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &env_var_or(key, default))
}

fn env_parse_opt<T>(key: &str) -> EngineResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw).map(Some),
        _ => Ok(None),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}
