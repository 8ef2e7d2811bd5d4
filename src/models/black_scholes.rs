use crate::errors::{ensure_finite, ensure_positive, EngineError, EngineResult};
use crate::models::normal::NormalDistribution;
use serde::Serialize;

/// Below this vega the Newton step is numerically meaningless.
const VEGA_FLOOR: f64 = 1e-8;

/// Option market state for one pricing request.
///
/// Copy-by-value snapshot: every computation reads all five fields from the
/// same instance. Sweeps and solvers build a new snapshot per step via
/// `with_spot` / `with_volatility` instead of mutating a shared object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptionParameters {
    pub spot: f64,
    pub strike: f64,
    /// Years.
    pub time_to_maturity: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
}

impl OptionParameters {
    /// Validated constructor: S, K, T, sigma strictly positive, r finite.
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_maturity: f64,
        risk_free_rate: f64,
        volatility: f64,
    ) -> EngineResult<Self> {
        ensure_positive("spot", spot)?;
        ensure_positive("strike", strike)?;
        ensure_positive("time_to_maturity", time_to_maturity)?;
        ensure_finite("risk_free_rate", risk_free_rate)?;
        ensure_positive("volatility", volatility)?;
        Ok(Self { spot, strike, time_to_maturity, risk_free_rate, volatility })
    }

    #[inline]
    pub fn with_spot(self, spot: f64) -> Self {
        Self { spot, ..self }
    }

    /// No positivity check: the implied-vol search may legitimately wander
    /// through negative sigma, and callers must see that.
    #[inline]
    pub fn with_volatility(self, volatility: f64) -> Self {
        Self { volatility, ..self }
    }

    /// e^(-rT)
    #[inline]
    pub fn discount_factor(&self) -> f64 {
        (-self.risk_free_rate * self.time_to_maturity).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Call,
    Put,
}

/// Closed-form sensitivities in annual units.
/// Gamma and vega are shared by calls and puts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GreeksResult {
    pub delta_call: f64,
    pub delta_put: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta_call: f64,
    pub theta_put: f64,
    pub rho_call: f64,
    pub rho_put: f64,
}

/// Greeks rescaled the way traders read them: theta per calendar day,
/// vega and rho per percentage point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayGreeks {
    pub delta_call: f64,
    pub delta_put: f64,
    pub gamma: f64,
    pub vega_per_point: f64,
    pub theta_call_per_day: f64,
    pub theta_put_per_day: f64,
    pub rho_call_per_point: f64,
    pub rho_put_per_point: f64,
}

impl GreeksResult {
    pub fn to_display(&self) -> DisplayGreeks {
        DisplayGreeks {
            delta_call: self.delta_call,
            delta_put: self.delta_put,
            gamma: self.gamma,
            vega_per_point: self.vega * 0.01,
            theta_call_per_day: self.theta_call / 365.0,
            theta_put_per_day: self.theta_put / 365.0,
            rho_call_per_point: self.rho_call * 0.01,
            rho_put_per_point: self.rho_put * 0.01,
        }
    }
}

/// Newton-Raphson settings for the implied-vol search.
#[derive(Debug, Clone, Copy)]
pub struct IvSearch {
    pub precision: f64,
    pub max_iterations: usize,
}

impl Default for IvSearch {
    fn default() -> Self {
        Self { precision: 1e-5, max_iterations: 100 }
    }
}

/// How the implied-vol search ended. Only `Converged` guarantees the
/// repriced value is within `precision` of the market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IvStatus {
    Converged,
    VegaFloor,
    MaxIterations,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpliedVolResult {
    pub sigma: f64,
    pub iterations: usize,
    pub status: IvStatus,
}

impl ImpliedVolResult {
    #[inline]
    pub fn converged(&self) -> bool {
        self.status == IvStatus::Converged
    }
}

/// One point of a spot sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioPoint {
    pub spot: f64,
    pub call: f64,
    /// max(S - K, 0): the payoff at expiry.
    pub intrinsic: f64,
    pub gamma: f64,
}

/// Black-Scholes European option pricing.
///
/// C = S*Phi(d1) - K*e^(-rT)*Phi(d2)
/// P = K*e^(-rT)*Phi(-d2) - S*Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma*sqrt(T)), d2 = d1 - sigma*sqrt(T).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholesModel {
    /// Standard normal distribution (created once, reused)
    normal: NormalDistribution,
}

impl BlackScholesModel {
    pub fn new() -> Self {
        Self { normal: NormalDistribution::standard() }
    }

    /// Fails on degenerate inputs instead of returning NaN/inf.
    pub fn d1d2(&self, params: &OptionParameters) -> EngineResult<(f64, f64)> {
        ensure_positive("spot", params.spot)?;
        ensure_positive("strike", params.strike)?;
        ensure_positive("time_to_maturity", params.time_to_maturity)?;
        ensure_finite("risk_free_rate", params.risk_free_rate)?;
        ensure_finite("volatility", params.volatility)?;

        let sigma_sqrt_t = params.volatility * params.time_to_maturity.sqrt();
        if sigma_sqrt_t == 0.0 {
            return Err(EngineError::invalid(
                "volatility",
                params.volatility,
                "sigma*sqrt(T) must be non-zero",
            ));
        }

        let d1 = ((params.spot / params.strike).ln()
            + (params.risk_free_rate + 0.5 * params.volatility * params.volatility)
                * params.time_to_maturity)
            / sigma_sqrt_t;
        Ok((d1, d1 - sigma_sqrt_t))
    }

    pub fn price_call(&self, params: &OptionParameters) -> EngineResult<f64> {
        let (d1, d2) = self.d1d2(params)?;
        let df = params.discount_factor();
        Ok(params.spot * self.normal.cdf(d1) - params.strike * df * self.normal.cdf(d2))
    }

    pub fn price_put(&self, params: &OptionParameters) -> EngineResult<f64> {
        let (d1, d2) = self.d1d2(params)?;
        let df = params.discount_factor();
        Ok(params.strike * df * self.normal.cdf(-d2) - params.spot * self.normal.cdf(-d1))
    }

    #[inline]
    pub fn price(&self, params: &OptionParameters, kind: OptionKind) -> EngineResult<f64> {
        match kind {
            OptionKind::Call => self.price_call(params),
            OptionKind::Put => self.price_put(params),
        }
    }

    /// dV/dsigma, identical for calls and puts.
    pub fn vega(&self, params: &OptionParameters) -> EngineResult<f64> {
        let (d1, _) = self.d1d2(params)?;
        Ok(params.spot * params.time_to_maturity.sqrt() * self.normal.pdf(d1))
    }

    pub fn greeks(&self, params: &OptionParameters) -> EngineResult<GreeksResult> {
        let (d1, d2) = self.d1d2(params)?;

        let s = params.spot;
        let k = params.strike;
        let r = params.risk_free_rate;
        let t = params.time_to_maturity;
        let sigma = params.volatility;
        let sqrt_t = t.sqrt();
        let df = params.discount_factor();

        let cdf_d1 = self.normal.cdf(d1);
        let pdf_d1 = self.normal.pdf(d1);
        let cdf_d2 = self.normal.cdf(d2);
        let cdf_neg_d2 = self.normal.cdf(-d2);

        // Time decay shared by both sides
        let decay = -(s * pdf_d1 * sigma) / (2.0 * sqrt_t);

        Ok(GreeksResult {
            delta_call: cdf_d1,
            delta_put: cdf_d1 - 1.0,
            gamma: pdf_d1 / (s * sigma * sqrt_t),
            vega: s * sqrt_t * pdf_d1,
            theta_call: decay - r * k * df * cdf_d2,
            theta_put: decay + r * k * df * cdf_neg_d2,
            rho_call: k * t * df * cdf_d2,
            rho_put: -k * t * df * cdf_neg_d2,
        })
    }

    /// Newton-Raphson implied volatility.
    ///
    /// Soft failure: hitting the vega floor or the iteration cap is not an
    /// error. The last iterate is returned with its status, and callers decide
    /// whether it is plausible. Only a degenerate reprice (sigma*sqrt(T) == 0,
    /// bad S/K/T) surfaces as `Err`.
    pub fn implied_volatility(
        &self,
        params: &OptionParameters,
        market_price: f64,
        initial_guess: f64,
        kind: OptionKind,
        search: IvSearch,
    ) -> EngineResult<ImpliedVolResult> {
        ensure_finite("market_price", market_price)?;
        ensure_finite("initial_guess", initial_guess)?;

        let mut sigma = initial_guess;

        for i in 0..search.max_iterations {
            let snapshot = params.with_volatility(sigma);
            let model_price = self.price(&snapshot, kind)?;
            let vega = self.vega(&snapshot)?;
            let price_difference = market_price - model_price;

            if price_difference.abs() < search.precision {
                return Ok(ImpliedVolResult {
                    sigma,
                    iterations: i + 1,
                    status: IvStatus::Converged,
                });
            }

            if vega.abs() < VEGA_FLOOR {
                tracing::warn!(sigma, vega, price_difference, "implied vol hit vega floor");
                return Ok(ImpliedVolResult {
                    sigma,
                    iterations: i + 1,
                    status: IvStatus::VegaFloor,
                });
            }

            sigma += price_difference / vega;
        }

        tracing::warn!(
            sigma,
            max_iterations = search.max_iterations,
            "implied vol did not converge"
        );
        Ok(ImpliedVolResult {
            sigma,
            iterations: search.max_iterations,
            status: IvStatus::MaxIterations,
        })
    }

    /// Reprice the call and gamma across spots `lower*S ..= upper*S`,
    /// evenly spaced, endpoints included.
    pub fn scenario_sweep(
        &self,
        params: &OptionParameters,
        lower: f64,
        upper: f64,
        points: usize,
    ) -> EngineResult<Vec<ScenarioPoint>> {
        ensure_positive("lower", lower)?;
        ensure_positive("upper", upper)?;
        if upper < lower {
            return Err(EngineError::invalid("upper", upper, "must be >= lower"));
        }
        if points == 0 {
            return Err(EngineError::invalid("points", 0.0, "must be at least 1"));
        }

        let start = params.spot * lower;
        let stop = params.spot * upper;
        let step = if points > 1 { (stop - start) / (points - 1) as f64 } else { 0.0 };

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let spot = if i + 1 == points && points > 1 { stop } else { start + step * i as f64 };
            let snapshot = params.with_spot(spot);
            out.push(ScenarioPoint {
                spot,
                call: self.price_call(&snapshot)?,
                intrinsic: (spot - snapshot.strike).max(0.0),
                gamma: self.greeks(&snapshot)?.gamma,
            });
        }
        Ok(out)
    }
}
