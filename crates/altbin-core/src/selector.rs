//! Public entry points for altitude bin selection.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::bins::{AltitudeBin, ObservedSpan};
use crate::config::AltBinConfig;
use crate::error::{AltBinError, AltBinResult};
use crate::estimator::{estimate, SelectionMethod};
use crate::stats::min_max;

/// Altitude bins for one sample set, with how they were derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Ordered, gap-free and non-overlapping.
    pub bins: Vec<AltitudeBin>,
    pub method: SelectionMethod,
    pub span: ObservedSpan,
}

/// Validated configuration, reusable across any number of sample sets.
#[derive(Debug, Clone)]
pub struct AltGroupSelector {
    config: AltBinConfig,
}

impl AltGroupSelector {
    pub fn new(config: AltBinConfig) -> AltBinResult<Self> {
        config.validate()?;
        config.histogram_bins()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AltBinConfig {
        &self.config
    }

    /// Select altitude bins for `samples` (virtual heights in km).
    pub fn run(&self, samples: &[f64]) -> AltBinResult<Selection> {
        if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
            return Err(AltBinError::NonFiniteSample { index });
        }
        let (min_km, max_km) = min_max(samples).ok_or(AltBinError::EmptySample)?;
        let span = ObservedSpan::new(min_km, max_km);

        let (bins, method) = estimate(samples, span, &self.config)?;
        debug!("{} samples -> {} altitude bins ({:?})", samples.len(), bins.len(), method);
        Ok(Selection { bins, method, span })
    }
}

/// Select altitude bins for `samples` using `config`.
pub fn select_alt_groups(samples: &[f64], config: &AltBinConfig) -> AltBinResult<Vec<AltitudeBin>> {
    AltGroupSelector::new(config.clone())?.run(samples).map(|s| s.bins)
}

/// Run independent sample sets in parallel. Results keep the input order.
#[cfg(feature = "threading")]
pub fn select_alt_groups_many<S>(sets: &[S], config: &AltBinConfig) -> Vec<AltBinResult<Selection>>
where
    S: AsRef<[f64]> + Sync,
{
    use rayon::prelude::*;

    match AltGroupSelector::new(config.clone()) {
        Ok(selector) => sets.par_iter().map(|s| selector.run(s.as_ref())).collect(),
        Err(e) => sets.iter().map(|_| Err(e.clone())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::locate_bin;
    use crate::config::FitConfig;
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    const CLUSTERS: [f64; 11] = [100.0, 100.0, 101.0, 102.0, 150.0, 151.0, 149.0, 150.0, 200.0, 201.0, 199.0];

    fn cluster_config() -> AltBinConfig {
        AltBinConfig {
            lower_km: 50.0,
            upper_km: 250.0,
            nominal_width_km: 30.0,
            min_points: 2,
            max_bins: 10,
            fit: FitConfig::default(),
        }
    }

    fn assert_tiles(sel: &Selection, cfg: &AltBinConfig) {
        let bins = &sel.bins;
        assert!(!bins.is_empty());
        assert!(bins.len() <= cfg.max_bins);
        for pair in bins.windows(2) {
            assert!(pair[0].lower_km < pair[1].lower_km, "unordered {bins:?}");
            assert_eq!(pair[0].upper_km, pair[1].lower_km, "gap or overlap in {bins:?}");
        }
        let floor = sel.span.min_km.max(cfg.lower_km);
        let ceiling = sel.span.max_km.min(cfg.upper_km);
        assert!(bins[0].lower_km <= floor, "{bins:?} misses {floor}");
        assert!(bins[bins.len() - 1].upper_km >= ceiling, "{bins:?} misses {ceiling}");
        assert!(bins[0].lower_km >= cfg.lower_km);
        assert!(bins[bins.len() - 1].upper_km <= cfg.upper_km);
    }

    #[test]
    fn three_clusters_give_three_bins() {
        let cfg = cluster_config();
        let sel = AltGroupSelector::new(cfg.clone()).unwrap().run(&CLUSTERS).unwrap();

        assert_eq!(sel.method, SelectionMethod::Fitted { components: 3 });
        assert_eq!(sel.bins.len(), 3, "bins {:?}", sel.bins);
        assert_tiles(&sel, &cfg);

        for (bin, cluster) in sel.bins.iter().zip([[100.0, 102.0], [149.0, 151.0], [199.0, 201.0]]) {
            assert!(bin.lower_km <= cluster[0] && bin.upper_km >= cluster[1], "{bin:?} vs {cluster:?}");
        }
    }

    #[test]
    fn spread_heights_fall_back_to_uniform_bins() {
        // One height per histogram bin: no peak reaches min_points.
        let samples: Vec<f64> = (0..10).map(|i| 60.0 + 20.0 * i as f64).collect();
        let cfg = AltBinConfig { nominal_width_km: 40.0, ..cluster_config() };
        let sel = AltGroupSelector::new(cfg.clone()).unwrap().run(&samples).unwrap();

        assert_eq!(sel.method, SelectionMethod::UniformNoPeaks);
        // ceil((240 - 60) / 40)
        assert_eq!(sel.bins.len(), 5);
        assert_tiles(&sel, &cfg);
    }

    #[test]
    fn separated_random_clusters_are_fitted() {
        let cfg = cluster_config();
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..40 {
            // Histogram bins are 20 km wide from 50 km. Each cluster stays in
            // one bin, with at least two empty bins between clusters.
            let mut slots = vec![rng.gen_range(0..=2usize)];
            while slots.len() < 3 {
                let next = slots[slots.len() - 1] + rng.gen_range(3..=4);
                if next > 9 {
                    break;
                }
                slots.push(next);
            }
            let mut samples = Vec::new();
            for &slot in &slots {
                let centre = 60.0 + 20.0 * slot as f64;
                for _ in 0..rng.gen_range(3..=8) {
                    samples.push(centre + rng.gen_range(-4.0..4.0));
                }
            }
            samples.shuffle(&mut rng);

            let sel = AltGroupSelector::new(cfg.clone()).unwrap().run(&samples).unwrap();
            assert!(
                matches!(sel.method, SelectionMethod::Fitted { components } if components >= 2),
                "{:?} for slots {slots:?}",
                sel.method
            );
            assert_tiles(&sel, &cfg);
            for &h in &samples {
                assert!(locate_bin(&sel.bins, h).is_some(), "{h} outside {:?}", sel.bins);
            }
        }
    }

    #[test]
    fn heights_outside_limits_map_to_edge_bins() {
        let cfg = cluster_config();
        let above = AltGroupSelector::new(cfg.clone()).unwrap().run(&[300.0, 305.0, 310.0]).unwrap();
        assert_eq!(above.method, SelectionMethod::UniformNoPeaks);
        assert_eq!(above.bins, vec![AltitudeBin::centred(220.0, 250.0)]);

        let below = AltGroupSelector::new(cfg).unwrap().run(&[10.0, 15.0, 20.0]).unwrap();
        assert_eq!(below.method, SelectionMethod::UniformNoPeaks);
        assert_eq!(below.bins, vec![AltitudeBin::centred(50.0, 80.0)]);
    }

    #[test]
    fn degenerate_range_is_rejected() {
        let cfg = AltBinConfig { lower_km: 100.0, upper_km: 101.0, ..cluster_config() };
        let err = select_alt_groups(&CLUSTERS, &cfg).unwrap_err();
        assert!(matches!(err, AltBinError::DegenerateRange { .. }), "{err:?}");
    }

    #[test]
    fn input_order_does_not_matter() {
        let cfg = cluster_config();
        let reference = select_alt_groups(&CLUSTERS, &cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut shuffled = CLUSTERS.to_vec();
        for _ in 0..5 {
            shuffled.shuffle(&mut rng);
            assert_eq!(select_alt_groups(&shuffled, &cfg).unwrap(), reference);
        }
    }

    #[test]
    fn capacity_overflow_is_an_error_not_a_truncation() {
        let samples: Vec<f64> = (0..10).map(|i| 60.0 + 20.0 * i as f64).collect();
        let cfg = AltBinConfig { nominal_width_km: 40.0, max_bins: 3, ..cluster_config() };
        let err = select_alt_groups(&samples, &cfg).unwrap_err();
        assert!(matches!(err, AltBinError::CapacityExceeded { limit: 3, .. }));
    }

    #[test]
    fn bad_samples_are_rejected() {
        let cfg = cluster_config();
        assert_eq!(select_alt_groups(&[], &cfg).unwrap_err(), AltBinError::EmptySample);
        assert_eq!(
            select_alt_groups(&[120.0, f64::NAN], &cfg).unwrap_err(),
            AltBinError::NonFiniteSample { index: 1 }
        );
    }

    #[test]
    fn selection_serialises_with_method_tag() {
        let cfg = cluster_config();
        let samples: Vec<f64> = (0..10).map(|i| 60.0 + 20.0 * i as f64).collect();
        let sel = AltGroupSelector::new(cfg).unwrap().run(&samples).unwrap();
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["method"]["kind"], "uniform_no_peaks");
        assert!(json["bins"].as_array().is_some_and(|b| !b.is_empty()));
    }

    #[cfg(feature = "threading")]
    #[test]
    fn parallel_runs_match_sequential() {
        let cfg = cluster_config();
        let spread: Vec<f64> = (0..10).map(|i| 60.0 + 20.0 * i as f64).collect();
        let sets = vec![CLUSTERS.to_vec(), spread.clone(), Vec::new()];
        let results = select_alt_groups_many(&sets, &cfg);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().bins, select_alt_groups(&CLUSTERS, &cfg).unwrap());
        assert_eq!(results[1].as_ref().unwrap().bins, select_alt_groups(&spread, &cfg).unwrap());
        assert_eq!(results[2].as_ref().unwrap_err(), &AltBinError::EmptySample);
    }
}
