use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Standard normal distribution N(0, 1).
///
/// Thin wrapper over statrs so pricing code reads `cdf`/`pdf` without
/// carrying the distribution parameters around. Stateless and Copy.
#[derive(Debug, Clone, Copy)]
pub struct NormalDistribution {
    inner: Normal,
}

impl NormalDistribution {
    pub fn standard() -> Self {
        Self { inner: Normal::standard() }
    }

    /// Phi(x). Accurate to well below 1e-7 for |x| < 10.
    #[inline]
    pub fn cdf(&self, x: f64) -> f64 {
        self.inner.cdf(x)
    }

    #[inline]
    pub fn pdf(&self, x: f64) -> f64 {
        self.inner.pdf(x)
    }
}

impl Default for NormalDistribution {
    fn default() -> Self {
        Self::standard()
    }
}
