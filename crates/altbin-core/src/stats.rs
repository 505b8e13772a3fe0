//! Histogram and extrema primitives used by the bin estimator.
use std::cmp::Ordering;

/// Equal-width histogram over `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    /// Left edge of every bin, strictly increasing.
    pub edges: Vec<f64>,
    pub bin_width: f64,
}

impl Histogram {
    /// Bin midpoints, used as the x-values of the Gaussian fit.
    pub fn centres(&self) -> Vec<f64> {
        self.edges.iter().map(|&e| e + 0.5 * self.bin_width).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Count `values` into `bin_count` equal-width bins spanning `[lower, upper]`.
///
/// Values outside the range (and non-finite values) are excluded, so the
/// counts sum to the number of in-range values. `upper` itself falls in the
/// last bin.
pub fn histogram(values: &[f64], bin_count: usize, lower: f64, upper: f64) -> Histogram {
    let bin_width = (upper - lower) / bin_count as f64;
    let edges = (0..bin_count).map(|i| lower + i as f64 * bin_width).collect();
    let mut counts = vec![0usize; bin_count];

    if bin_count > 0 && bin_width > 0.0 {
        for &v in values {
            if !(v >= lower && v <= upper) {
                continue;
            }
            let idx = (((v - lower) / bin_width).floor() as usize).min(bin_count - 1);
            counts[idx] += 1;
        }
    }

    Histogram { counts, edges, bin_width }
}

/// Indices whose count is at least every count within `radius` bins on each
/// side and strictly above at least one of them.
///
/// Plateaus of equal peaks are all flagged; a perfectly flat or empty
/// neighbourhood flags nothing.
pub fn relative_maxima(counts: &[usize], radius: usize) -> Vec<usize> {
    let n = counts.len();
    (0..n)
        .filter(|&i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(n.saturating_sub(1));
            let window = &counts[lo..=hi];
            window.iter().all(|&c| counts[i] >= c) && window.iter().any(|&c| counts[i] > c)
        })
        .collect()
}

/// Index of the largest count; the first one wins ties. `None` when empty.
pub fn absolute_max_index(counts: &[usize]) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (i, &c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((i, c)),
        })
        .map(|(i, _)| i)
}

/// Minimum and maximum of `values`. `None` when empty.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((lo, hi))
}

/// Stable ascending argsort.
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    idx
}
