use crate::models::black_scholes::ImpliedVolResult;
use crate::models::calibration::HestonCalibration;

/// Highest implied volatility still treated as a real answer (500%).
const MAX_PLAUSIBLE_IV: f64 = 5.0;

/// Plausibility check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlausibilityCheck {
    /// Usable as-is
    Accepted,
    /// Rejected with reason
    Rejected(&'static str),
}

impl PlausibilityCheck {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, PlausibilityCheck::Accepted)
    }
}

/// Screen a Heston calibration before simulating with it.
/// The estimator does not enforce parameter ranges; this does.
/// Pure function, no side effects.
#[inline]
pub fn check_heston_calibration(calibration: &HestonCalibration) -> PlausibilityCheck {
    let p = calibration.parameters();

    // 1. Everything finite
    if ![p.mu, p.kappa, p.theta, p.xi, p.rho, p.v0].iter().all(|x| x.is_finite()) {
        return PlausibilityCheck::Rejected("non-finite heston parameter");
    }

    // 2. Correlation range
    if !(-1.0..=1.0).contains(&p.rho) {
        return PlausibilityCheck::Rejected("rho outside [-1, 1]");
    }

    // 3. Mean reversion must pull toward theta, not away
    if p.kappa < 0.0 {
        return PlausibilityCheck::Rejected("negative mean-reversion speed");
    }

    // 4. Variance levels
    if p.theta < 0.0 || p.v0 < 0.0 {
        return PlausibilityCheck::Rejected("negative variance level");
    }

    // 5. Vol-of-vol
    if p.xi < 0.0 {
        return PlausibilityCheck::Rejected("negative vol-of-vol");
    }

    PlausibilityCheck::Accepted
}

/// Screen an implied-vol search outcome. Convergence alone is not enough:
/// Newton can converge on nonsense when started far away.
#[inline]
pub fn check_implied_vol(result: &ImpliedVolResult) -> PlausibilityCheck {
    if !result.sigma.is_finite() {
        return PlausibilityCheck::Rejected("non-finite implied volatility");
    }
    if !result.converged() {
        return PlausibilityCheck::Rejected("implied volatility search did not converge");
    }
    if result.sigma <= 0.0 {
        return PlausibilityCheck::Rejected("non-positive implied volatility");
    }
    if result.sigma > MAX_PLAUSIBLE_IV {
        return PlausibilityCheck::Rejected("implied volatility above 500%");
    }
    PlausibilityCheck::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes::IvStatus;
    use crate::models::calibration::{Estimate, FallbackReason};

    fn calibration() -> HestonCalibration {
        HestonCalibration {
            mu: 0.05,
            kappa: Estimate::Estimated { value: 2.0 },
            theta: 0.04,
            xi: 0.3,
            rho: Estimate::Estimated { value: -0.6 },
            v0: 0.05,
        }
    }

    #[test]
    fn test_normal_calibration_accepted() {
        assert!(check_heston_calibration(&calibration()).is_accepted());

        // Fallbacks are a quality flag, not a rejection
        let fallback = HestonCalibration {
            rho: Estimate::Fallback { value: -0.7, reason: FallbackReason::ZeroVariance },
            ..calibration()
        };
        assert!(check_heston_calibration(&fallback).is_accepted());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let bad_rho = HestonCalibration { rho: Estimate::Estimated { value: 1.3 }, ..calibration() };
        assert_eq!(
            check_heston_calibration(&bad_rho),
            PlausibilityCheck::Rejected("rho outside [-1, 1]")
        );

        let bad_kappa = HestonCalibration { kappa: Estimate::Estimated { value: -40.0 }, ..calibration() };
        assert!(!check_heston_calibration(&bad_kappa).is_accepted());

        let nan_xi = HestonCalibration { xi: f64::NAN, ..calibration() };
        assert!(!check_heston_calibration(&nan_xi).is_accepted());
    }

    #[test]
    fn test_implied_vol_screen() {
        let ok = ImpliedVolResult { sigma: 0.25, iterations: 4, status: IvStatus::Converged };
        assert!(check_implied_vol(&ok).is_accepted());

        let floor = ImpliedVolResult { status: IvStatus::VegaFloor, ..ok };
        assert!(!check_implied_vol(&floor).is_accepted());

        let negative = ImpliedVolResult { sigma: -0.1, ..ok };
        assert!(!check_implied_vol(&negative).is_accepted());

        let huge = ImpliedVolResult { sigma: 12.0, ..ok };
        assert!(!check_implied_vol(&huge).is_accepted());
    }
}
