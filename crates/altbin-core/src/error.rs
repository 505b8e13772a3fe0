use std::fmt;

use thiserror::Error;

/// Where a bin-count limit was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityStage {
    /// Evenly spaced fallback partition of the observed span.
    UniformPartition,
    /// Intervals accepted from the Gaussian fit.
    FittedComponents,
    /// Filler and candidate insertion during boundary reconciliation.
    Reconciliation,
}

impl fmt::Display for CapacityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapacityStage::UniformPartition => "uniform partition",
            CapacityStage::FittedComponents => "histogram fit",
            CapacityStage::Reconciliation => "boundary reconciliation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AltBinError {
    #[error(
        "virtual height range too small for a histogram analysis: \
         {bins} = ({upper} - {lower}) / {step}"
    )]
    DegenerateRange {
        bins: i64,
        lower: f64,
        upper: f64,
        step: f64,
    },

    #[error("{stage} created more than {limit} virtual height bins")]
    CapacityExceeded { stage: CapacityStage, limit: usize },

    #[error("no virtual height samples supplied")]
    EmptySample,

    #[error("virtual height sample {index} is not finite")]
    NonFiniteSample { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type AltBinResult<T> = std::result::Result<T, AltBinError>;
