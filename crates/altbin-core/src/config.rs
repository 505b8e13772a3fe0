//! Per-invocation configuration.
//!
//! Every call to the selector receives its own `AltBinConfig`; nothing is
//! cached between calls.
use serde::{Deserialize, Serialize};

use crate::bins::HeightLimits;
use crate::error::{AltBinError, AltBinResult};

/// Histograms never use more than this many bins.
pub const MAX_HISTOGRAM_BINS: usize = 10;

/// Search radius (bins on each side) for histogram relative maxima.
pub const PEAK_WINDOW_RADIUS: usize = 2;

/// Settings for the altitude bin search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AltBinConfig {
    /// Lowest physically plausible virtual height in km.
    pub lower_km: f64,
    /// Highest physically plausible virtual height in km.
    pub upper_km: f64,
    /// Suggested altitude bin width in km.
    pub nominal_width_km: f64,
    /// Histogram count needed before the absolute maximum counts as a peak.
    pub min_points: usize,
    /// Maximum number of altitude bins that may be produced.
    pub max_bins: usize,
    pub fit: FitConfig,
}

impl Default for AltBinConfig {
    fn default() -> Self {
        Self {
            lower_km: 50.0,
            upper_km: 450.0,
            nominal_width_km: 50.0,
            min_points: 3,
            max_bins: 10,
            fit: FitConfig::default(),
        }
    }
}

impl AltBinConfig {
    pub fn limits(&self) -> HeightLimits {
        HeightLimits::new(self.lower_km, self.upper_km)
    }

    /// Histogram bin count: `min(10, floor((upper - lower) / (0.25 * width)))`.
    ///
    /// Returns `DegenerateRange` when the range holds no histogram bin.
    pub fn histogram_bins(&self) -> AltBinResult<usize> {
        let step = 0.25 * self.nominal_width_km;
        let raw = ((self.upper_km - self.lower_km) / step).floor();
        if !(raw >= 1.0) {
            return Err(AltBinError::DegenerateRange {
                bins: if raw.is_finite() { raw as i64 } else { 0 },
                lower: self.lower_km,
                upper: self.upper_km,
                step,
            });
        }
        Ok((raw as usize).min(MAX_HISTOGRAM_BINS))
    }

    /// Reject settings the algorithm cannot work with.
    pub fn validate(&self) -> AltBinResult<()> {
        if !self.lower_km.is_finite() || !self.upper_km.is_finite() {
            return Err(AltBinError::InvalidConfig(format!(
                "height limits must be finite, got [{}, {}]",
                self.lower_km, self.upper_km
            )));
        }
        if !(self.nominal_width_km > 0.0) || !self.nominal_width_km.is_finite() {
            return Err(AltBinError::InvalidConfig(format!(
                "nominal width must be positive, got {}",
                self.nominal_width_km
            )));
        }
        if self.max_bins == 0 {
            return Err(AltBinError::InvalidConfig("max_bins must be at least 1".into()));
        }
        self.fit.validate()
    }
}

/// Levenberg-Marquardt settings for the histogram fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iterations: usize,
    /// Cap on model evaluations (one per trial parameter vector).
    pub max_evaluations: usize,
    /// Relative reduction in chi² below which the fit is converged.
    pub ftol: f64,
    /// Relative parameter change below which the fit is converged.
    pub xtol: f64,
    /// Cosine between residuals and any Jacobian column below which the fit
    /// is converged.
    pub gtol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_evaluations: 1600,
            ftol: 1.0e-10,
            xtol: 1.0e-10,
            gtol: 1.0e-10,
            initial_lambda: 1.0e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

impl FitConfig {
    fn validate(&self) -> AltBinResult<()> {
        if self.max_iterations == 0 || self.max_evaluations == 0 {
            return Err(AltBinError::InvalidConfig(
                "fit iteration and evaluation caps must be at least 1".into(),
            ));
        }
        if !(self.lambda_up > 1.0) || !(self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return Err(AltBinError::InvalidConfig(format!(
                "lambda factors must satisfy up > 1 and 0 < down < 1, got up={} down={}",
                self.lambda_up, self.lambda_down
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_bins_capped_at_ten() {
        let cfg = AltBinConfig { lower_km: 50.0, upper_km: 250.0, nominal_width_km: 30.0, ..Default::default() };
        assert_eq!(cfg.histogram_bins().unwrap(), 10);
    }

    #[test]
    fn histogram_bins_below_cap() {
        // 100 km / (0.25 * 50 km) = 8
        let cfg = AltBinConfig { lower_km: 100.0, upper_km: 200.0, nominal_width_km: 50.0, ..Default::default() };
        assert_eq!(cfg.histogram_bins().unwrap(), 8);
    }

    #[test]
    fn narrow_range_is_degenerate() {
        let cfg = AltBinConfig { lower_km: 100.0, upper_km: 101.0, nominal_width_km: 30.0, ..Default::default() };
        match cfg.histogram_bins() {
            Err(AltBinError::DegenerateRange { bins, .. }) => assert_eq!(bins, 0),
            other => panic!("expected DegenerateRange, got {other:?}"),
        }
    }

    #[test]
    fn inverted_range_is_degenerate() {
        let cfg = AltBinConfig { lower_km: 300.0, upper_km: 100.0, ..Default::default() };
        assert!(matches!(cfg.histogram_bins(), Err(AltBinError::DegenerateRange { .. })));
    }

    #[test]
    fn validate_rejects_bad_width() {
        let cfg = AltBinConfig { nominal_width_km: 0.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(AltBinError::InvalidConfig(_))));
        let cfg = AltBinConfig { max_bins: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(AltBinError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: AltBinConfig = serde_json::from_str(r#"{"nominal_width_km": 30.0}"#).unwrap();
        assert_eq!(cfg.nominal_width_km, 30.0);
        assert_eq!(cfg.max_bins, 10);
        assert_eq!(cfg.fit.max_evaluations, 1600);
    }
}
