//! Select virtual-height altitude bins for one or more sample files.
//! Each input is a JSON array of heights in km, or an object with a
//! `vheight` array. Output: one JSON report per input.

use altbin_core::{AltBinConfig, AltGroupSelector, Selection};
use anyhow::{bail, Context, Result};
use clap::Parser;
use flexi_logger::Logger;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "alt_groups", about = "Select virtual height bins from backscatter samples")]
struct Args {
    /// Sample files (JSON).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON configuration file; fields left out keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lowest allowed virtual height in km.
    #[arg(long)]
    lower: Option<f64>,

    /// Highest allowed virtual height in km.
    #[arg(long)]
    upper: Option<f64>,

    /// Nominal altitude bin width in km.
    #[arg(short, long)]
    width: Option<f64>,

    /// Minimum histogram count for the absolute maximum to count as a peak.
    #[arg(long)]
    min_points: Option<usize>,

    /// Maximum number of altitude bins.
    #[arg(long)]
    max_bins: Option<usize>,

    /// Directory for per-input reports. Reports go to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level spec, overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ── I/O types ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum SampleFile {
    Bare(Vec<f64>),
    Keyed { vheight: Vec<f64> },
}

impl SampleFile {
    fn into_heights(self) -> Vec<f64> {
        match self {
            SampleFile::Bare(v) => v,
            SampleFile::Keyed { vheight } => vheight,
        }
    }
}

#[derive(Serialize)]
struct Report {
    input: String,
    n_samples: usize,
    #[serde(flatten)]
    selection: Selection,
}

// ── Config ────────────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<AltBinConfig> {
    let mut cfg = match &args.config {
        Some(path) => serde_json::from_str(
            &fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )
        .with_context(|| format!("parsing {}", path.display()))?,
        None => AltBinConfig::default(),
    };
    if let Some(v) = args.lower {
        cfg.lower_km = v;
    }
    if let Some(v) = args.upper {
        cfg.upper_km = v;
    }
    if let Some(v) = args.width {
        cfg.nominal_width_km = v;
    }
    if let Some(v) = args.min_points {
        cfg.min_points = v;
    }
    if let Some(v) = args.max_bins {
        cfg.max_bins = v;
    }
    Ok(cfg)
}

fn process(selector: &AltGroupSelector, path: &Path) -> Result<Report> {
    let sample: SampleFile = serde_json::from_str(
        &fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
    )
    .with_context(|| format!("parsing {}", path.display()))?;
    let heights = sample.into_heights();
    let selection = selector
        .run(&heights)
        .with_context(|| format!("selecting bins for {}", path.display()))?;
    Ok(Report {
        input: path.display().to_string(),
        n_samples: heights.len(),
        selection,
    })
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let _logger = Logger::try_with_env_or_str(&args.log_level)?.log_to_stderr().start()?;

    let cfg = load_config(&args)?;
    let selector = AltGroupSelector::new(cfg).context("invalid configuration")?;

    info!("Processing {} sample files ...", args.inputs.len());
    let results: Vec<Result<Report>> = args.inputs.par_iter().map(|p| process(&selector, p)).collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = 0usize;
    for res in results {
        match res {
            Ok(r) => {
                info!("{}: {} bins ({:?})", r.input, r.selection.bins.len(), r.selection.method);
                reports.push(r);
            }
            Err(e) => {
                warn!("{e:#}");
                failures += 1;
            }
        }
    }

    match &args.output {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            for r in &reports {
                let stem = Path::new(&r.input)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "samples".into());
                let out_path = dir.join(format!("{stem}_bins.json"));
                fs::write(&out_path, serde_json::to_string_pretty(r)?)?;
                info!("  -> {}", out_path.display());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    if failures > 0 {
        bail!("{failures} of {} inputs failed", args.inputs.len());
    }
    Ok(())
}
