//! Levenberg-Marquardt least squares over a dynamically sized parameter vector.
//!
//! The damped normal equations `(JᵀJ + λ·s·I) δ = Jᵀr` are solved by Cholesky
//! factorisation, where `s` is the largest diagonal entry of `JᵀJ`. A trial
//! step that fails to reduce chi² raises λ and is retried within the same
//! iteration.
//!
//! Besides the usual chi², step and gradient tests, a fit whose chi² drops
//! below `ftol` times the data's own sum of squares is reported as an exact
//! fit. Histograms with isolated spikes only approach zero residual as the
//! widths collapse, so the relative tests alone never fire on them.
use nalgebra::{DMatrix, DVector};

use crate::config::FitConfig;

/// Above this the damping has swamped the curvature and the search gives up.
const LAMBDA_MAX: f64 = 1.0e20;

/// A model fit by least squares.
///
/// `residuals` fills `(yᵢ - f(xᵢ)) / σᵢ` and `jacobian` fills
/// `∂f(xᵢ)/∂pⱼ / σᵢ`, one row per data point.
pub trait LeastSquaresModel {
    fn data_len(&self) -> usize;

    /// Σ(yᵢ / σᵢ)², the chi² of a model that predicts zero everywhere.
    fn data_norm_squared(&self) -> f64;

    fn residuals(&self, params: &[f64], out: &mut [f64]);

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);

    /// Pull parameters back into their valid domain after an update.
    fn constrain(&self, _params: &mut [f64]) {}
}

/// Which test declared convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Chi² fell below `ftol` times the data's sum of squares.
    Exact,
    /// Relative chi² reduction fell below `ftol`.
    Chi2,
    /// Relative parameter step fell below `xtol`.
    Parameters,
    /// Residual vector is orthogonal to the Jacobian columns within `gtol`.
    Gradient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Converged(Convergence),
    MaxIterations,
    MaxEvaluations,
    /// Damping grew past its ceiling without an acceptable step.
    Stalled,
    /// The model produced NaN or infinite residuals at the starting point.
    NonFinite,
}

impl FitStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FitStatus::Converged(_))
    }
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    pub chi2: f64,
    pub status: FitStatus,
    pub iterations: usize,
    pub evaluations: usize,
}

/// Minimise the sum of squared residuals of `model` starting from `initial`.
pub fn optimize<M: LeastSquaresModel>(model: &M, initial: &[f64], config: &FitConfig) -> LmOutcome {
    let n = model.data_len();
    let m = initial.len();

    let mut params = DVector::from_column_slice(initial);
    model.constrain(params.as_mut_slice());

    let mut resid = DVector::zeros(n);
    model.residuals(params.as_slice(), resid.as_mut_slice());
    let mut evaluations = 1;
    let mut chi2 = resid.norm_squared();
    let chi2_floor = config.ftol * model.data_norm_squared();

    if !chi2.is_finite() {
        return LmOutcome {
            params: params.as_slice().to_vec(),
            chi2,
            status: FitStatus::NonFinite,
            iterations: 0,
            evaluations,
        };
    }

    let mut jacobian = DMatrix::zeros(n, m);
    let mut trial_resid = DVector::zeros(n);
    let mut lambda = config.initial_lambda;
    let mut status = FitStatus::MaxIterations;
    let mut iterations = 0;

    'outer: for iter in 0..config.max_iterations {
        iterations = iter + 1;

        if chi2 <= chi2_floor {
            status = FitStatus::Converged(Convergence::Exact);
            break;
        }

        model.jacobian(params.as_slice(), &mut jacobian);
        let jt = jacobian.transpose();
        let hessian = &jt * &jacobian;
        let gradient = &jt * &resid;

        if gradient_cosine(&jacobian, &gradient, chi2.sqrt()) <= config.gtol {
            status = FitStatus::Converged(Convergence::Gradient);
            break;
        }

        let scale = hessian
            .diagonal()
            .iter()
            .cloned()
            .fold(0.0f64, f64::max)
            .max(f64::EPSILON);

        loop {
            let mut damped = hessian.clone();
            for i in 0..m {
                damped[(i, i)] += lambda * scale;
            }

            let Some(cholesky) = damped.cholesky() else {
                lambda *= config.lambda_up;
                if lambda > LAMBDA_MAX {
                    status = FitStatus::Stalled;
                    break 'outer;
                }
                continue;
            };
            let delta = cholesky.solve(&gradient);

            let mut trial = &params + &delta;
            model.constrain(trial.as_mut_slice());

            if evaluations >= config.max_evaluations {
                status = FitStatus::MaxEvaluations;
                break 'outer;
            }
            model.residuals(trial.as_slice(), trial_resid.as_mut_slice());
            evaluations += 1;
            let trial_chi2 = trial_resid.norm_squared();

            let step = (&trial - &params).norm();
            let small_step = step <= config.xtol * (params.norm() + config.xtol);

            if trial_chi2.is_finite() && trial_chi2 < chi2 {
                let reduction = (chi2 - trial_chi2) / chi2;
                params = trial;
                std::mem::swap(&mut resid, &mut trial_resid);
                chi2 = trial_chi2;
                lambda = (lambda * config.lambda_down).max(f64::EPSILON);

                if chi2 <= chi2_floor {
                    status = FitStatus::Converged(Convergence::Exact);
                    break 'outer;
                }
                if reduction <= config.ftol {
                    status = FitStatus::Converged(Convergence::Chi2);
                    break 'outer;
                }
                if small_step {
                    status = FitStatus::Converged(Convergence::Parameters);
                    break 'outer;
                }
                break;
            }

            if small_step {
                status = FitStatus::Converged(Convergence::Parameters);
                break 'outer;
            }
            lambda *= config.lambda_up;
            if lambda > LAMBDA_MAX {
                status = FitStatus::Stalled;
                break 'outer;
            }
        }
    }

    LmOutcome {
        params: params.as_slice().to_vec(),
        chi2,
        status,
        iterations,
        evaluations,
    }
}

/// Largest |cos| between the residual vector and any non-zero Jacobian column.
fn gradient_cosine(jacobian: &DMatrix<f64>, gradient: &DVector<f64>, resid_norm: f64) -> f64 {
    (0..jacobian.ncols())
        .filter_map(|j| {
            let col_norm = jacobian.column(j).norm();
            (col_norm > 0.0).then(|| gradient[j].abs() / (col_norm * resid_norm))
        })
        .fold(0.0f64, f64::max)
}
