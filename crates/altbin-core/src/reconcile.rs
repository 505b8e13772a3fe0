//! Boundary reconciliation: turn unordered, possibly overlapping or gapped
//! candidate intervals into an ordered tiling of the observed height span.
//!
//! Candidates are walked in ascending order of lower bound. Each one is
//! compared with the last interval already laid down:
//!
//! * overlap (either interval reaches the other's peak): the interval with
//!   the better `Priority` keeps the contested range;
//! * gap: narrower than one nominal width stretches the last interval,
//!   otherwise evenly spaced filler intervals are inserted;
//! * touching or slight overlap short of either peak: the last interval is
//!   trimmed to meet the candidate.
//!
//! Fillers are also used below the first and above the last candidate so the
//! result reaches both ends of the observed span, clamped to the global limits.
use log::debug;

use crate::bins::{AltitudeBin, HeightLimits, ObservedSpan, Priority};
use crate::error::{AltBinError, AltBinResult, CapacityStage};
use crate::stats::argsort;

#[derive(Debug, Clone, Copy)]
struct Slot {
    bin: AltitudeBin,
    priority: Priority,
}

/// Output under construction.
struct Layout {
    slots: Vec<Slot>,
    limit: usize,
    width_km: f64,
    next_filler: usize,
}

impl Layout {
    fn new(limit: usize, width_km: f64) -> Self {
        Self { slots: Vec::with_capacity(limit), limit, width_km, next_filler: 0 }
    }

    fn push(&mut self, bin: AltitudeBin, priority: Priority) -> AltBinResult<()> {
        if self.slots.len() >= self.limit {
            return Err(AltBinError::CapacityExceeded {
                stage: CapacityStage::Reconciliation,
                limit: self.limit,
            });
        }
        self.slots.push(Slot { bin, priority });
        Ok(())
    }

    /// Cover `[from, to]` with `floor((to - from) / width)` equal fillers.
    /// Returns `false`, inserting nothing, when the gap is narrower than one
    /// nominal width.
    fn fill(&mut self, from: f64, to: f64) -> AltBinResult<bool> {
        let pieces = ((to - from) / self.width_km).floor() as usize;
        if pieces == 0 {
            return Ok(false);
        }
        let span = (to - from) / pieces as f64;
        debug!("filling {from:.2}-{to:.2} km with {pieces} bins of {span:.2} km");
        for i in 0..pieces {
            let lower = from + i as f64 * span;
            let upper = if i + 1 == pieces { to } else { from + (i + 1) as f64 * span };
            let priority = Priority::Filler(self.next_filler);
            self.next_filler += 1;
            self.push(AltitudeBin::centred(lower, upper), priority)?;
        }
        Ok(true)
    }

    /// Move the upper bound of slot `idx`, keeping its peak inside.
    fn set_upper(&mut self, idx: usize, upper_km: f64) {
        let bin = &mut self.slots[idx].bin;
        bin.upper_km = upper_km;
        bin.peak_km = bin.peak_km.max(bin.lower_km).min(upper_km);
    }

    fn last_index(&self) -> Option<usize> {
        self.slots.len().checked_sub(1)
    }
}

fn clamp_bin(bin: &AltitudeBin, limits: HeightLimits) -> AltitudeBin {
    let lower_km = limits.clamp(bin.lower_km);
    let upper_km = limits.clamp(bin.upper_km);
    let peak_km = bin.peak_km.max(lower_km).min(upper_km);
    AltitudeBin { lower_km, upper_km, peak_km }
}

/// Reconcile `candidates` into an ordered, gap-free, overlap-free list that
/// covers `span` clamped to `limits`.
///
/// Candidates keep their input position as retention rank: earlier entries
/// win contested ranges. Candidates that are empty after clamping are
/// dropped. Returns an empty list when nothing is left, and
/// `CapacityExceeded` as soon as more than `max_bins` intervals are needed.
pub fn reconcile(
    candidates: &[AltitudeBin],
    span: ObservedSpan,
    limits: HeightLimits,
    width_km: f64,
    max_bins: usize,
) -> AltBinResult<Vec<AltitudeBin>> {
    let clamped: Vec<(usize, AltitudeBin)> = candidates
        .iter()
        .map(|b| clamp_bin(b, limits))
        .enumerate()
        .filter(|(_, b)| {
            let keep = b.lower_km < b.upper_km;
            if !keep {
                debug!("dropping empty candidate {:.2}-{:.2} km", b.lower_km, b.upper_km);
            }
            keep
        })
        .collect();
    if clamped.is_empty() {
        return Ok(Vec::new());
    }

    let lowers: Vec<f64> = clamped.iter().map(|(_, b)| b.lower_km).collect();
    let mut ordered: Vec<(AltitudeBin, Priority)> = argsort(&lowers)
        .into_iter()
        .map(|k| (clamped[k].1, Priority::Original(clamped[k].0)))
        .collect();

    let floor_km = limits.clamp(span.min_km);
    let ceiling_km = limits.clamp(span.max_km);
    let mut layout = Layout::new(max_bins, width_km);

    // ── Below the lowest candidate ───────────────────────────────────────────
    let first = &mut ordered[0].0;
    if first.lower_km > floor_km && !layout.fill(floor_km, first.lower_km)? {
        first.lower_km = floor_km;
    }

    // ── Merge pass ───────────────────────────────────────────────────────────
    for (cand, priority) in ordered {
        let Some(idx) = layout.last_index() else {
            layout.push(cand, priority)?;
            continue;
        };
        let last = layout.slots[idx];

        if last.bin.upper_km >= cand.peak_km || cand.lower_km <= last.bin.peak_km {
            if last.priority.outranks(priority) {
                // Keep only the part of the candidate above the last bin.
                if cand.upper_km > last.bin.upper_km {
                    let lower = last.bin.upper_km;
                    let bin = if cand.peak_km > lower {
                        AltitudeBin::new(lower, cand.upper_km, cand.peak_km)
                    } else {
                        AltitudeBin::centred(lower, cand.upper_km)
                    };
                    layout.push(bin, priority)?;
                } else {
                    debug!(
                        "candidate {:.2}-{:.2} km absorbed by {:.2}-{:.2} km",
                        cand.lower_km, cand.upper_km, last.bin.lower_km, last.bin.upper_km
                    );
                }
            } else {
                while layout.slots.last().is_some_and(|s| s.bin.lower_km >= cand.lower_km) {
                    if let Some(dropped) = layout.slots.pop() {
                        debug!(
                            "candidate {:.2}-{:.2} km displaces {:.2}-{:.2} km",
                            cand.lower_km, cand.upper_km, dropped.bin.lower_km, dropped.bin.upper_km
                        );
                    }
                }
                if let Some(prev) = layout.last_index() {
                    layout.set_upper(prev, cand.lower_km);
                }
                layout.push(cand, priority)?;
            }
        } else if last.bin.upper_km < cand.lower_km {
            if !layout.fill(last.bin.upper_km, cand.lower_km)? {
                layout.set_upper(idx, cand.lower_km);
            }
            layout.push(cand, priority)?;
        } else {
            layout.set_upper(idx, cand.lower_km);
            layout.push(cand, priority)?;
        }
    }

    // ── Above the highest candidate ──────────────────────────────────────────
    if let Some(idx) = layout.last_index() {
        let top = layout.slots[idx].bin.upper_km;
        if top < ceiling_km && !layout.fill(top, ceiling_km)? {
            layout.set_upper(idx, ceiling_km);
        }
    }

    Ok(layout.slots.into_iter().map(|s| s.bin).collect())
}
