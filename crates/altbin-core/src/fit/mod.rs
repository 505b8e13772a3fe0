//! Nonlinear least-squares fitting of Gaussian mixtures to histograms.
pub mod gaussian;
pub mod lm;

pub use gaussian::{fit_mixture, GaussianComponent, MixtureFit};
pub use lm::{Convergence, FitStatus};
