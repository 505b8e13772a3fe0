//! Peak-driven altitude bin estimation.
//!
//! Virtual heights are histogrammed between the global limits, occurrence
//! peaks are located, and a sum of Gaussians seeded at the peaks is fit to the
//! histogram. Each accepted component contributes its ±3σ window as a
//! candidate bin; candidates are then reconciled into a tiling of the
//! observed span. With no usable peak the span is split into equal bins of
//! the nominal width instead.
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bins::{AltitudeBin, HeightLimits, ObservedSpan};
use crate::config::{AltBinConfig, PEAK_WINDOW_RADIUS};
use crate::error::{AltBinError, AltBinResult, CapacityStage};
use crate::fit::{fit_mixture, GaussianComponent};
use crate::reconcile::reconcile;
use crate::stats::{absolute_max_index, histogram, relative_maxima, Histogram};

/// How a set of altitude bins was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Reconciled from `components` accepted Gaussian components.
    Fitted { components: usize },
    /// Histogram had no significant peak.
    UniformNoPeaks,
    /// Peaks were found but the fit produced no acceptable component.
    UniformFitRejected,
}

/// Histogram peaks: relative maxima within `PEAK_WINDOW_RADIUS` bins, plus
/// the absolute maximum when it was missed and holds at least `min_points`.
pub fn find_peaks(counts: &[usize], min_points: usize) -> Vec<usize> {
    let mut peaks = relative_maxima(counts, PEAK_WINDOW_RADIUS);
    if let Some(imax) = absolute_max_index(counts) {
        if !peaks.contains(&imax) && counts[imax] >= min_points.max(1) {
            peaks.push(imax);
            peaks.sort_unstable();
        }
    }
    peaks
}

/// Split the observed span into `ceil(range / width)` bins of the nominal
/// width, clamped to the global limits.
///
/// The first bin starts at `range / n + min - width`, which never lies above
/// the observed minimum. That start is clamped so the first bin fits between
/// the limits, which keeps a sample lying wholly outside the limits mapped to
/// the nearest edge bin on either side. Bins stop early once the upper limit
/// is reached.
pub fn uniform_partition(
    span: ObservedSpan,
    limits: HeightLimits,
    width_km: f64,
    max_bins: usize,
) -> AltBinResult<Vec<AltitudeBin>> {
    let n = span.interval_count(width_km);
    if n > max_bins {
        return Err(AltBinError::CapacityExceeded {
            stage: CapacityStage::UniformPartition,
            limit: max_bins,
        });
    }

    let start = span.range() / n as f64 + span.min_km - width_km;
    let mut bins = Vec::with_capacity(n);
    let mut lower = start.min(limits.upper_km - width_km).max(limits.lower_km);
    while bins.len() < n && lower < limits.upper_km {
        let upper = (lower + width_km).min(limits.upper_km);
        bins.push(AltitudeBin::centred(lower, upper));
        lower = upper;
    }
    Ok(bins)
}

/// Fit one Gaussian per peak and keep the components whose centre survives
/// inside their own clamped ±2σ window. Each kept component yields its
/// clamped ±3σ window, peaked at the fitted centre.
///
/// A fit that does not converge yields no candidates.
fn fitted_candidates(
    hist: &Histogram,
    peaks: &[usize],
    config: &AltBinConfig,
) -> AltBinResult<Vec<AltitudeBin>> {
    let limits = config.limits();
    let x = hist.centres();
    let y: Vec<f64> = hist.counts.iter().map(|&c| c as f64).collect();
    let seeds: Vec<GaussianComponent> = peaks
        .iter()
        .map(|&i| GaussianComponent {
            amplitude: y[i],
            centre_km: x[i],
            sigma_km: 0.5 * config.nominal_width_km,
        })
        .collect();

    let fit = fit_mixture(&x, &y, &seeds, &config.fit);
    debug!(
        "histogram fit of {} components: {:?} after {} iterations ({} evaluations), chi2 {:.4e}",
        seeds.len(),
        fit.status,
        fit.iterations,
        fit.evaluations,
        fit.chi2
    );
    if !fit.status.is_success() {
        warn!("histogram fit did not converge ({:?})", fit.status);
        return Ok(Vec::new());
    }

    let mut candidates = Vec::with_capacity(fit.components.len());
    for g in &fit.components {
        if !(g.centre_km.is_finite() && g.sigma_km.is_finite()) {
            continue;
        }
        let (lo3, hi3) = g.window(3.0);
        let (lo2, hi2) = g.window(2.0);
        let (lo2, hi2) = (limits.clamp(lo2), limits.clamp(hi2));
        if g.centre_km < lo2 || g.centre_km > hi2 {
            debug!("rejecting component at {:.2} km: outside height limits", g.centre_km);
            continue;
        }

        if candidates.len() >= config.max_bins {
            return Err(AltBinError::CapacityExceeded {
                stage: CapacityStage::FittedComponents,
                limit: config.max_bins,
            });
        }
        let (lower, upper) = (limits.clamp(lo3), limits.clamp(hi3));
        candidates.push(AltitudeBin::new(lower, upper, g.centre_km.max(lower).min(upper)));
    }
    Ok(candidates)
}

/// Run the full estimation for `samples`, whose extremes are `span`.
///
/// `config` must already be validated.
pub fn estimate(
    samples: &[f64],
    span: ObservedSpan,
    config: &AltBinConfig,
) -> AltBinResult<(Vec<AltitudeBin>, SelectionMethod)> {
    let limits = config.limits();
    let width = config.nominal_width_km;
    let nbins = config.histogram_bins()?;

    let hist = histogram(samples, nbins, limits.lower_km, limits.upper_km);
    let peaks = find_peaks(&hist.counts, config.min_points);
    debug!(
        "histogram {:?} ({} of {} samples in range), peaks at bins {:?}",
        hist.counts,
        hist.total(),
        samples.len(),
        peaks
    );

    if peaks.is_empty() {
        debug!("no significant histogram peak, splitting span into {width} km bins");
        let bins = uniform_partition(span, limits, width, config.max_bins)?;
        return Ok((bins, SelectionMethod::UniformNoPeaks));
    }

    let candidates = fitted_candidates(&hist, &peaks, config)?;
    if !candidates.is_empty() {
        let bins = reconcile(&candidates, span, limits, width, config.max_bins)?;
        if !bins.is_empty() {
            return Ok((bins, SelectionMethod::Fitted { components: candidates.len() }));
        }
    }

    warn!("no usable fitted components, splitting span into {width} km bins");
    let bins = uniform_partition(span, limits, width, config.max_bins)?;
    Ok((bins, SelectionMethod::UniformFitRejected))
}
