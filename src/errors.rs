/// Domain-specific error types for the pricing and simulation engine.
/// Closed-form pricing and estimation surface these immediately; soft outcomes
/// (estimation fallbacks, implied-vol non-convergence) are tagged results instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("simulation error: {0}")]
    Simulation(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        EngineError::InvalidParameter { name, value, reason }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Simulation(format!("worker join failed: {e}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject non-finite or non-positive values.
#[inline]
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() {
        return Err(EngineError::invalid(name, value, "must be finite"));
    }
    if value <= 0.0 {
        return Err(EngineError::invalid(name, value, "must be positive"));
    }
    Ok(())
}

#[inline]
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() {
        return Err(EngineError::invalid(name, value, "must be finite"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_guard() {
        assert!(ensure_positive("spot", 100.0).is_ok());
        assert!(matches!(
            ensure_positive("spot", 0.0),
            Err(EngineError::InvalidParameter { name: "spot", .. })
        ));
        assert!(ensure_positive("spot", f64::NAN).is_err());
        assert!(ensure_finite("rate", -0.01).is_ok());
        assert!(ensure_finite("rate", f64::INFINITY).is_err());
    }

    #[test]
    fn test_display_names_parameter() {
        let e = EngineError::invalid("volatility", 0.0, "must be positive");
        assert_eq!(e.to_string(), "invalid parameter volatility=0: must be positive");
    }
}
