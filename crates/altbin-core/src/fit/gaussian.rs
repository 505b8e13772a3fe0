//! Sum-of-Gaussians model for fitting virtual-height histograms.
//!
//! Parameters are packed as `[a₀, c₀, σ₀, a₁, c₁, σ₁, …]`:
//! f(x) = Σₖ aₖ · exp(−(x − cₖ)² / 2σₖ²)
use nalgebra::DMatrix;

use super::lm::{optimize, FitStatus, LeastSquaresModel};
use crate::config::FitConfig;

/// Widths are kept above this so the model stays differentiable.
const MIN_SIGMA_KM: f64 = 1.0e-6;

/// One bell-curve component. Centre and width are in km, amplitude in counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianComponent {
    pub amplitude: f64,
    pub centre_km: f64,
    pub sigma_km: f64,
}

impl GaussianComponent {
    pub fn value(&self, x: f64) -> f64 {
        let d = x - self.centre_km;
        self.amplitude * (-d * d / (2.0 * self.sigma_km * self.sigma_km)).exp()
    }

    /// `[centre − k·σ, centre + k·σ]`.
    pub fn window(&self, k: f64) -> (f64, f64) {
        let half = k * self.sigma_km.abs();
        (self.centre_km - half, self.centre_km + half)
    }
}

/// Histogram data with per-point uncertainties.
pub struct MultiGaussian<'a> {
    x: &'a [f64],
    y: &'a [f64],
    y_err: &'a [f64],
}

impl<'a> MultiGaussian<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64], y_err: &'a [f64]) -> Self {
        debug_assert!(x.len() == y.len() && y.len() == y_err.len());
        Self { x, y, y_err }
    }

    fn model(params: &[f64], x: f64) -> f64 {
        params
            .chunks_exact(3)
            .map(|p| {
                let d = x - p[1];
                p[0] * (-d * d / (2.0 * p[2] * p[2])).exp()
            })
            .sum()
    }
}

impl LeastSquaresModel for MultiGaussian<'_> {
    fn data_len(&self) -> usize {
        self.x.len()
    }

    fn data_norm_squared(&self) -> f64 {
        self.y.iter().zip(self.y_err).map(|(y, e)| (y / e) * (y / e)).sum()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) {
        for (i, r) in out.iter_mut().enumerate() {
            *r = (self.y[i] - Self::model(params, self.x[i])) / self.y_err[i];
        }
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        for (i, &x) in self.x.iter().enumerate() {
            let w = 1.0 / self.y_err[i];
            for (k, p) in params.chunks_exact(3).enumerate() {
                let (a, c, s) = (p[0], p[1], p[2]);
                let d = x - c;
                let e = (-d * d / (2.0 * s * s)).exp();
                out[(i, 3 * k)] = e * w;
                out[(i, 3 * k + 1)] = a * e * d / (s * s) * w;
                out[(i, 3 * k + 2)] = a * e * d * d / (s * s * s) * w;
            }
        }
    }

    fn constrain(&self, params: &mut [f64]) {
        for p in params.chunks_exact_mut(3) {
            p[2] = p[2].abs().max(MIN_SIGMA_KM);
        }
    }
}

/// Result of fitting a Gaussian mixture to a histogram.
#[derive(Debug, Clone)]
pub struct MixtureFit {
    pub components: Vec<GaussianComponent>,
    pub status: FitStatus,
    pub chi2: f64,
    pub iterations: usize,
    pub evaluations: usize,
}

/// Jointly fit `seeds` to `(x, y)` with unit uncertainties.
pub fn fit_mixture(x: &[f64], y: &[f64], seeds: &[GaussianComponent], config: &FitConfig) -> MixtureFit {
    let y_err = vec![1.0; y.len()];
    let model = MultiGaussian::new(x, y, &y_err);

    let initial: Vec<f64> = seeds
        .iter()
        .flat_map(|g| [g.amplitude, g.centre_km, g.sigma_km])
        .collect();
    let out = optimize(&model, &initial, config);

    let components = out
        .params
        .chunks_exact(3)
        .map(|p| GaussianComponent { amplitude: p[0], centre_km: p[1], sigma_km: p[2].abs() })
        .collect();

    MixtureFit {
        components,
        status: out.status,
        chi2: out.chi2,
        iterations: out.iterations,
        evaluations: out.evaluations,
    }
}
