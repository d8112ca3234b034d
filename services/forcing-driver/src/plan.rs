//! Dry run of bracket resolution over an output window.
//!
//! Walks the output clock the way the engine does and reports, per product
//! and output time, which input files would be read and which of them would
//! have to be regridded. Nothing is decoded.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use forcing_engine::{
    BracketResolver, DomainDecomposition, ForcingState, Frame, FrameSlot, OutputClock,
    ProductKey, Result,
};
use serde::Serialize;

/// One input frame of a planned bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FramePlan {
    pub valid_time: DateTime<Utc>,
    pub cycle_time: DateTime<Utc>,
    pub forecast_hour: Option<u32>,
    pub path: PathBuf,
    pub available: bool,
}

impl From<&Frame> for FramePlan {
    fn from(frame: &Frame) -> Self {
        Self {
            valid_time: frame.valid_time,
            cycle_time: frame.cycle_time,
            forecast_hour: frame.forecast_hour,
            path: frame.path.clone(),
            available: frame.available,
        }
    }
}

/// Planned work for one product at one output time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub valid_time: DateTime<Utc>,
    pub product: &'static str,
    pub key: u8,
    pub previous: FramePlan,
    pub next: FramePlan,
    /// Both files are on disk; otherwise the product is skipped this step.
    pub ready: bool,
    pub regrid_previous: bool,
    pub regrid_next: bool,
}

impl PlanEntry {
    pub fn regrid_count(&self) -> usize {
        usize::from(self.regrid_previous) + usize::from(self.regrid_next)
    }
}

/// Resolve every product's bracket at every time of `clock`.
///
/// Frames of a ready bracket are treated as regridded afterwards, so later
/// entries only flag frames the engine would actually have to regrid again.
pub fn plan_window<B: BracketResolver>(
    states: &mut BTreeMap<ProductKey, ForcingState>,
    resolver: &B,
    decomposition: &DomainDecomposition,
    clock: OutputClock,
) -> Result<Vec<PlanEntry>> {
    let mut entries = Vec::with_capacity(clock.remaining() * states.len());

    for now in clock {
        for (&key, state) in states.iter_mut() {
            let stale = resolver.find_bracket(state, now, decomposition)?;
            let bracket = state.check_bracket(now)?.clone();
            let ready = bracket.is_available();

            entries.push(PlanEntry {
                valid_time: now,
                product: state.name(),
                key: key.code(),
                previous: FramePlan::from(&bracket.previous),
                next: FramePlan::from(&bracket.next),
                ready,
                regrid_previous: ready && stale.previous,
                regrid_next: ready && stale.next,
            });

            if ready {
                for slot in FrameSlot::BOTH {
                    if stale.contains(slot) {
                        state.mark_regridded(slot);
                    }
                }
            }
        }
    }

    Ok(entries)
}

/// Plain-text table of a plan, one line per entry.
pub fn format_table(entries: &[PlanEntry]) -> String {
    let mut out = format!(
        "{:<20} {:<28} {:<6} {:>6}  {}\n",
        "VALID TIME", "PRODUCT", "READY", "REGRID", "FILES"
    );
    for entry in entries {
        let mark = |frame: &FramePlan| if frame.available { "" } else { " (missing)" };
        out.push_str(&format!(
            "{:<20} {:<28} {:<6} {:>6}  {}{} -> {}{}\n",
            entry.valid_time.format("%Y-%m-%d %H:%M"),
            entry.product,
            if entry.ready { "yes" } else { "no" },
            entry.regrid_count(),
            entry.previous.path.display(),
            mark(&entry.previous),
            entry.next.path.display(),
            mark(&entry.next),
        ));
    }
    out
}
