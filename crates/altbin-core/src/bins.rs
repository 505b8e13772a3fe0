//! Altitude bin types shared by the estimator and the reconciler.
use serde::{Deserialize, Serialize};

/// One altitude interval in km. `peak_km` is the representative height of the
/// population it holds and always lies inside `[lower_km, upper_km]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBin {
    pub lower_km: f64,
    pub upper_km: f64,
    pub peak_km: f64,
}

impl AltitudeBin {
    pub fn new(lower_km: f64, upper_km: f64, peak_km: f64) -> Self {
        Self { lower_km, upper_km, peak_km }
    }

    /// Bin with its peak at the midpoint.
    pub fn centred(lower_km: f64, upper_km: f64) -> Self {
        Self::new(lower_km, upper_km, lower_km + 0.5 * (upper_km - lower_km))
    }

    /// Half-open membership test, `lower <= h < upper`.
    pub fn contains(&self, height_km: f64) -> bool {
        height_km >= self.lower_km && height_km < self.upper_km
    }
}

/// Index of the bin holding `height_km` in an ordered, gap-free bin list.
/// The top edge of the last bin is inclusive.
pub fn locate_bin(bins: &[AltitudeBin], height_km: f64) -> Option<usize> {
    let last = bins.len().checked_sub(1)?;
    let idx = bins.partition_point(|b| b.upper_km <= height_km);
    if idx <= last && bins[idx].contains(height_km) {
        Some(idx)
    } else if height_km == bins[last].upper_km {
        Some(last)
    } else {
        None
    }
}

/// Global limits on plausible virtual height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightLimits {
    pub lower_km: f64,
    pub upper_km: f64,
}

impl HeightLimits {
    pub fn new(lower_km: f64, upper_km: f64) -> Self {
        Self { lower_km, upper_km }
    }

    #[inline]
    pub fn clamp(&self, h: f64) -> f64 {
        h.max(self.lower_km).min(self.upper_km)
    }
}

/// Smallest and largest measured virtual height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedSpan {
    pub min_km: f64,
    pub max_km: f64,
}

impl ObservedSpan {
    pub fn new(min_km: f64, max_km: f64) -> Self {
        Self { min_km, max_km }
    }

    pub fn range(&self) -> f64 {
        self.max_km - self.min_km
    }

    /// Number of nominal-width intervals needed to span the observations,
    /// never less than one.
    pub fn interval_count(&self, width_km: f64) -> usize {
        ((self.range() / width_km).ceil() as usize).max(1)
    }
}

/// Retention priority during reconciliation. Any original candidate outranks
/// any filler; within a kind the lower rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Original(usize),
    Filler(usize),
}

impl Priority {
    /// True when `self` should be kept in preference to `other`.
    pub fn outranks(self, other: Priority) -> bool {
        self < other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<AltitudeBin> {
        vec![
            AltitudeBin::centred(80.0, 130.0),
            AltitudeBin::centred(130.0, 180.0),
            AltitudeBin::centred(180.0, 220.0),
        ]
    }

    #[test]
    fn locate_bin_uses_half_open_intervals() {
        let bins = ladder();
        assert_eq!(locate_bin(&bins, 80.0), Some(0));
        assert_eq!(locate_bin(&bins, 129.9), Some(0));
        assert_eq!(locate_bin(&bins, 130.0), Some(1));
        assert_eq!(locate_bin(&bins, 219.0), Some(2));
    }

    #[test]
    fn locate_bin_top_edge_inclusive() {
        let bins = ladder();
        assert_eq!(locate_bin(&bins, 220.0), Some(2));
        assert_eq!(locate_bin(&bins, 220.5), None);
        assert_eq!(locate_bin(&bins, 79.0), None);
        assert_eq!(locate_bin(&[], 100.0), None);
    }

    #[test]
    fn originals_always_outrank_fillers() {
        assert!(Priority::Original(7).outranks(Priority::Filler(0)));
        assert!(Priority::Original(0).outranks(Priority::Original(1)));
        assert!(Priority::Filler(2).outranks(Priority::Filler(3)));
        assert!(!Priority::Filler(0).outranks(Priority::Original(9)));
    }

    #[test]
    fn interval_count_is_at_least_one() {
        assert_eq!(ObservedSpan::new(100.0, 100.0).interval_count(30.0), 1);
        assert_eq!(ObservedSpan::new(60.0, 240.0).interval_count(40.0), 5);
        assert_eq!(ObservedSpan::new(100.0, 160.0).interval_count(30.0), 2);
    }
}
