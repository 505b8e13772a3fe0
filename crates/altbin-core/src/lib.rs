//! Altitude bin selection for radar virtual-height measurements.
//!
//! Given a sample of virtual heights, find a small set of contiguous,
//! non-overlapping altitude intervals that separate statistically distinct
//! populations. Histogram peaks seed a Gaussian mixture fit whose components
//! become candidate intervals; the candidates are then reconciled into an
//! ordered tiling of the observed span.
//!
//! ```no_run
//! use altbin_core::{select_alt_groups, AltBinConfig};
//!
//! let heights = [100.0, 100.0, 101.0, 102.0, 150.0, 151.0, 149.0, 150.0, 200.0, 201.0, 199.0];
//! let config = AltBinConfig { lower_km: 50.0, upper_km: 250.0, nominal_width_km: 30.0, min_points: 2, ..Default::default() };
//! let bins = select_alt_groups(&heights, &config)?;
//! # Ok::<(), altbin_core::AltBinError>(())
//! ```
pub mod bins;
pub mod config;
pub mod error;
pub mod estimator;
pub mod fit;
pub mod reconcile;
pub mod selector;
pub mod stats;

pub use bins::{locate_bin, AltitudeBin, HeightLimits, ObservedSpan, Priority};
pub use config::{AltBinConfig, FitConfig};
pub use error::{AltBinError, AltBinResult, CapacityStage};
pub use estimator::SelectionMethod;
pub use reconcile::reconcile;
pub use selector::{select_alt_groups, AltGroupSelector, Selection};

#[cfg(feature = "threading")]
pub use selector::select_alt_groups_many;
