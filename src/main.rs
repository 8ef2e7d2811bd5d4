use quantsim::config::AppConfig;
use quantsim::errors::{EngineError, EngineResult};
use quantsim::feeds::price_file::{FilePriceSource, PriceSource};
use quantsim::report::{self, RunReport, SimulationReport};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries only the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("quantsim starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let source = FilePriceSource::new(&cfg.price_file);
    let series = match source.load() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("price history error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        source = %source.name(),
        observations = series.len(),
        spot = series.last(),
        "price history loaded"
    );

    // ── Monte Carlo runs (CPU-bound, off the async workers) ──

    let sim_config = cfg.simulation_config();
    let var_percentile = cfg.var_percentile;

    let gbm_series = series.clone();
    let gbm_task = tokio::task::spawn_blocking(move || {
        report::gbm_report(&gbm_series, sim_config, var_percentile)
    });

    let heston_series = series.clone();
    let heston_task = tokio::task::spawn_blocking(move || {
        report::heston_report(&heston_series, sim_config, var_percentile)
    });

    // ── Pricing runs while the simulations do ──

    let pricing = report::pricing_section(&series, &cfg.pricing_request());

    let (gbm, heston) = tokio::join!(gbm_task, heston_task);
    let gbm = gbm.unwrap_or_else(|e| {
        SimulationReport::failed("GBM", &sim_config, EngineError::from(e).to_string())
    });
    let heston = heston.unwrap_or_else(|e| {
        SimulationReport::failed("Heston", &sim_config, EngineError::from(e).to_string())
    });

    let run = RunReport::new(source.name(), &series, pricing, gbm, heston);

    match render(&run) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("report serialization error: {e}");
            std::process::exit(1);
        }
    }

    tracing::info!(run_id = %run.run_id, "quantsim finished");
}

fn render(run: &RunReport) -> EngineResult<String> {
    Ok(serde_json::to_string_pretty(run)?)
}
