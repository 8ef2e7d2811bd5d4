use crate::errors::EngineResult;
use crate::models::black_scholes::{
    BlackScholesModel, DisplayGreeks, GreeksResult, ImpliedVolResult, IvSearch, OptionKind,
    OptionParameters, ScenarioPoint,
};
use crate::models::calibration::{heston_parameters, HestonCalibration};
use crate::models::volatility::{daily_vol_and_drift, GbmParameters, HistoricalSeries};
use crate::risk::limits::{check_heston_calibration, check_implied_vol, PlausibilityCheck};
use crate::risk::scenario::{mean_path, summarize, RiskSummary};
use crate::simulation::gbm::GbmSimulator;
use crate::simulation::heston::HestonSimulator;
use crate::simulation::{PathSimulator, SimulationConfig};
use serde::Serialize;

/// Spot sweep bounds, as fractions of the current spot.
const SWEEP_LOWER: f64 = 0.8;
const SWEEP_UPPER: f64 = 1.2;

// ── Result quality ──

/// How much a caller can trust a section of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Quality {
    Precise,
    Fallback { reasons: Vec<String> },
    Failed { reason: String },
}

impl Quality {
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Quality::Failed { .. })
    }
}

// ── Pricing ──

/// Option inputs the historical series does not supply.
#[derive(Debug, Clone, Copy)]
pub struct PricingRequest {
    /// None prices at the money.
    pub strike: Option<f64>,
    pub time_to_maturity: f64,
    pub risk_free_rate: f64,
    pub market_call_price: Option<f64>,
    pub iv_search: IvSearch,
    pub scenario_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Richness {
    Overpriced,
    Underpriced,
}

/// Implied vs historical volatility for a quoted call.
/// `result`, `spread` and `richness` are None when the search could not run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpliedVolReport {
    pub market_price: f64,
    pub result: Option<ImpliedVolResult>,
    pub historical_volatility: f64,
    /// implied - historical
    pub spread: Option<f64>,
    pub richness: Option<Richness>,
    pub quality: Quality,
}

impl ImpliedVolReport {
    pub fn new(market_price: f64, result: ImpliedVolResult, historical_volatility: f64) -> Self {
        let spread = result.sigma - historical_volatility;
        let quality = match check_implied_vol(&result) {
            PlausibilityCheck::Accepted => Quality::Precise,
            PlausibilityCheck::Rejected(reason) => Quality::Failed { reason: reason.to_string() },
        };
        Self {
            market_price,
            result: Some(result),
            historical_volatility,
            spread: Some(spread),
            richness: Some(if spread > 0.0 { Richness::Overpriced } else { Richness::Underpriced }),
            quality,
        }
    }

    pub fn failed(market_price: f64, historical_volatility: f64, reason: String) -> Self {
        tracing::warn!(market_price, %reason, "implied vol search failed");
        Self {
            market_price,
            result: None,
            historical_volatility,
            spread: None,
            richness: None,
            quality: Quality::Failed { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingReport {
    pub parameters: OptionParameters,
    pub call: f64,
    pub put: f64,
    pub greeks: GreeksResult,
    pub display_greeks: DisplayGreeks,
    pub implied_volatility: Option<ImpliedVolReport>,
    pub scenario: Vec<ScenarioPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PricingSection {
    Computed(Box<PricingReport>),
    Failed { reason: String },
}

/// Price calls/puts off the last historical price and its historical vol.
pub fn price_from_history(
    series: &HistoricalSeries,
    request: &PricingRequest,
) -> EngineResult<PricingReport> {
    let historical_vol = daily_vol_and_drift(series)?.annualized_volatility();
    let spot = series.last();
    let params = OptionParameters::new(
        spot,
        request.strike.unwrap_or(spot),
        request.time_to_maturity,
        request.risk_free_rate,
        historical_vol,
    )?;
    price_option(&params, request)
}

pub fn price_option(params: &OptionParameters, request: &PricingRequest) -> EngineResult<PricingReport> {
    let model = BlackScholesModel::new();
    let greeks = model.greeks(params)?;

    // Seed the search at the current (historical) volatility. A failed search
    // only marks the IV entry; prices and Greeks are still reported.
    let implied_volatility = request.market_call_price.map(|market_price| {
        match model.implied_volatility(
            params,
            market_price,
            params.volatility,
            OptionKind::Call,
            request.iv_search,
        ) {
            Ok(result) => ImpliedVolReport::new(market_price, result, params.volatility),
            Err(e) => ImpliedVolReport::failed(market_price, params.volatility, e.to_string()),
        }
    });

    Ok(PricingReport {
        parameters: *params,
        call: model.price_call(params)?,
        put: model.price_put(params)?,
        greeks,
        display_greeks: greeks.to_display(),
        implied_volatility,
        scenario: model.scenario_sweep(params, SWEEP_LOWER, SWEEP_UPPER, request.scenario_points)?,
    })
}

pub fn pricing_section(series: &HistoricalSeries, request: &PricingRequest) -> PricingSection {
    match price_from_history(series, request) {
        Ok(report) => PricingSection::Computed(Box::new(report)),
        Err(e) => {
            tracing::error!(error = %e, "pricing failed");
            PricingSection::Failed { reason: e.to_string() }
        }
    }
}

// ── Simulation ──

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelCalibration {
    Gbm(GbmParameters),
    Heston(HestonCalibration),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub model: &'static str,
    pub quality: Quality,
    pub seed: Option<u64>,
    pub days: usize,
    pub replications: usize,
    pub calibration: Option<ModelCalibration>,
    pub mean_path: Vec<f64>,
    pub summary: Option<RiskSummary>,
}

impl SimulationReport {
    pub fn failed(model: &'static str, config: &SimulationConfig, reason: String) -> Self {
        tracing::error!(model, %reason, "simulation failed");
        Self {
            model,
            quality: Quality::Failed { reason },
            seed: None,
            days: config.days,
            replications: config.replications,
            calibration: None,
            mean_path: Vec::new(),
            summary: None,
        }
    }
}

/// Calibrate GBM from history and simulate forward from the last price.
/// Never errors: failures land in `quality`.
pub fn gbm_report(
    series: &HistoricalSeries,
    config: SimulationConfig,
    var_percentile: f64,
) -> SimulationReport {
    let run = || -> EngineResult<SimulationReport> {
        let params = daily_vol_and_drift(series)?;
        let simulator = GbmSimulator::new(params)?;
        simulation_report(&simulator, series, config, var_percentile, Quality::Precise)
            .map(|r| SimulationReport { calibration: Some(ModelCalibration::Gbm(params)), ..r })
    };
    run().unwrap_or_else(|e| SimulationReport::failed("GBM", &config, e.to_string()))
}

/// Calibrate Heston from history, screen the calibration, and simulate.
/// Never errors: failures land in `quality`.
pub fn heston_report(
    series: &HistoricalSeries,
    config: SimulationConfig,
    var_percentile: f64,
) -> SimulationReport {
    let calibration = match heston_parameters(series) {
        Ok(c) => c,
        Err(e) => return SimulationReport::failed("Heston", &config, e.to_string()),
    };

    if let PlausibilityCheck::Rejected(reason) = check_heston_calibration(&calibration) {
        let mut report =
            SimulationReport::failed("Heston", &config, format!("calibration rejected: {reason}"));
        report.calibration = Some(ModelCalibration::Heston(calibration));
        return report;
    }

    let quality = if calibration.uses_fallback() {
        Quality::Fallback {
            reasons: calibration
                .fallbacks()
                .into_iter()
                .map(|(name, reason)| format!("{name}: {reason}"))
                .collect(),
        }
    } else {
        Quality::Precise
    };

    let run = || -> EngineResult<SimulationReport> {
        let simulator = HestonSimulator::new(calibration.parameters())?;
        simulation_report(&simulator, series, config, var_percentile, quality)
    };
    match run() {
        Ok(report) => SimulationReport {
            calibration: Some(ModelCalibration::Heston(calibration)),
            ..report
        },
        Err(e) => SimulationReport::failed("Heston", &config, e.to_string()),
    }
}

fn simulation_report(
    simulator: &dyn PathSimulator,
    series: &HistoricalSeries,
    config: SimulationConfig,
    var_percentile: f64,
    quality: Quality,
) -> EngineResult<SimulationReport> {
    let spot = series.last();
    let run = simulator.simulate(spot, &config)?;
    let summary = summarize(&run.prices, spot, var_percentile)?;

    tracing::info!(
        model = simulator.name(),
        seed = run.seed,
        paths = config.replications,
        steps = config.days,
        var = summary.value_at_risk.price,
        probability_of_profit = summary.probability_of_profit,
        "simulation complete"
    );

    Ok(SimulationReport {
        model: simulator.name(),
        quality,
        seed: Some(run.seed),
        days: config.days,
        replications: config.replications,
        calibration: None,
        mean_path: mean_path(&run.prices),
        summary: Some(summary),
    })
}

// ── Whole run ──

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: uuid::Uuid,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub source: String,
    pub observations: usize,
    pub spot: f64,
    pub pricing: PricingSection,
    pub gbm: SimulationReport,
    pub heston: SimulationReport,
}

impl RunReport {
    pub fn new(
        source: String,
        series: &HistoricalSeries,
        pricing: PricingSection,
        gbm: SimulationReport,
        heston: SimulationReport,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            generated_at: chrono::Utc::now(),
            source,
            observations: series.len(),
            spot: series.last(),
            pricing,
            gbm,
            heston,
        }
    }
}
