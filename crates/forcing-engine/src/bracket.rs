//! Locating the input files that bracket an output time.
//!
//! For every output time `now` a product needs two frames: the latest one
//! valid at or before `now` and the earliest one valid at or after it. The
//! resolver works out which issuance cycle and lead time each frame comes
//! from, renders the product's file template and checks whether the file is
//! on disk yet. A file that has not arrived is not an error: the frame is
//! recorded with `available == false` and the engine skips the product for
//! that timestep.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{ForcingError, Result};
use crate::grid::DomainDecomposition;
use crate::product::ProductKind;
use crate::state::{Bracket, ForcingState, Frame, StaleFrames};
use crate::time::{ceil_to, floor_to};

/// Outcome of looking up a single input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLookup {
    /// The file is on disk.
    Found(PathBuf),
    /// The file has not been produced upstream yet.
    NotYetAvailable { expected: PathBuf },
    /// The request cannot be answered from the product's configuration.
    MalformedRequest(String),
}

impl FrameLookup {
    /// Check the filesystem for `path`.
    pub fn on_disk(path: PathBuf) -> Self {
        if path.is_file() {
            Self::Found(path)
        } else {
            Self::NotYetAvailable { expected: path }
        }
    }
}

/// Finds the two frames surrounding an output time.
pub trait BracketResolver {
    /// Work out the bracket for `now`.
    ///
    /// The returned bracket must satisfy
    /// `previous.valid_time <= now <= next.valid_time`.
    fn locate(
        &self,
        state: &ForcingState,
        now: DateTime<Utc>,
        decomposition: &DomainDecomposition,
    ) -> Result<Bracket>;

    /// Locate the bracket and record it in `state`, returning the buffers
    /// that need regridding.
    fn find_bracket(
        &self,
        state: &mut ForcingState,
        now: DateTime<Utc>,
        decomposition: &DomainDecomposition,
    ) -> Result<StaleFrames> {
        let bracket = self.locate(state, now, decomposition)?;
        Ok(state.update_bracket(bracket))
    }
}

/// Resolves brackets from each product's cycle cadence and file template.
///
/// Forecast products are read from the cycle issued at or before
/// `forecast_cycle` (after applying the product's cycle offset) for as long
/// as the requested frame lies within the configured horizon. Past the
/// horizon, the most recent cycle that could contain the frame is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleBracketResolver {
    forecast_cycle: DateTime<Utc>,
}

impl CycleBracketResolver {
    pub fn new(forecast_cycle: DateTime<Utc>) -> Self {
        Self { forecast_cycle }
    }

    pub fn forecast_cycle(&self) -> DateTime<Utc> {
        self.forecast_cycle
    }

    /// Issuance cycle used for a frame valid at `valid`.
    fn cycle_for(&self, state: &ForcingState, valid: DateTime<Utc>) -> DateTime<Utc> {
        let spec = state.spec();
        let offset = Duration::minutes(state.cycle_offset_minutes);
        let freshest = floor_to(valid - offset, spec.cycle_frequency());

        match spec.kind {
            ProductKind::Analysis => freshest,
            ProductKind::Forecast => {
                let anchor = floor_to(self.forecast_cycle - offset, spec.cycle_frequency());
                let cycle = anchor.min(freshest);
                if valid - cycle > Duration::minutes(state.forecast_horizon_minutes) {
                    freshest
                } else {
                    cycle
                }
            }
        }
    }

    fn lookup(&self, state: &ForcingState, valid: DateTime<Utc>) -> (Frame, FrameLookup) {
        let spec = state.spec();
        let cycle = self.cycle_for(state, valid);
        let lead = valid - cycle;
        let lead_hours = lead.num_hours();

        let lookup = if lead < Duration::zero() {
            FrameLookup::MalformedRequest(format!(
                "frame valid at {} precedes its cycle {}",
                valid, cycle
            ))
        } else {
            match render_template(&state.file_template, cycle, valid, lead_hours as u32) {
                Ok(relative) => FrameLookup::on_disk(state.input_dir.join(relative)),
                Err(reason) => FrameLookup::MalformedRequest(reason),
            }
        };

        let path = match &lookup {
            FrameLookup::Found(path) | FrameLookup::NotYetAvailable { expected: path } => {
                path.clone()
            }
            FrameLookup::MalformedRequest(_) => PathBuf::new(),
        };

        let frame = Frame {
            available: matches!(lookup, FrameLookup::Found(_)),
            path,
            valid_time: valid,
            cycle_time: cycle,
            forecast_hour: spec.is_forecast().then_some(lead_hours as u32),
        };
        (frame, lookup)
    }

    fn frame(&self, state: &ForcingState, valid: DateTime<Utc>) -> Result<Frame> {
        match self.lookup(state, valid) {
            (_, FrameLookup::MalformedRequest(reason)) => Err(ForcingError::MalformedRequest {
                product: state.name().to_string(),
                reason,
            }),
            (frame, FrameLookup::NotYetAvailable { expected }) => {
                debug!(
                    product = %state.name(),
                    valid_time = %valid,
                    expected = %expected.display(),
                    "Input file not yet available"
                );
                Ok(frame)
            }
            (frame, FrameLookup::Found(_)) => Ok(frame),
        }
    }
}

impl BracketResolver for CycleBracketResolver {
    fn locate(
        &self,
        state: &ForcingState,
        now: DateTime<Utc>,
        _decomposition: &DomainDecomposition,
    ) -> Result<Bracket> {
        let spec = state.spec();
        if spec.frame_interval_minutes <= 0 || spec.cycle_frequency_minutes <= 0 {
            return Err(ForcingError::MalformedRequest {
                product: state.name().to_string(),
                reason: "product has no frame cadence".to_string(),
            });
        }

        let next_valid = ceil_to(now, spec.frame_interval());
        let previous_valid = next_valid - spec.frame_interval();

        let bracket = Bracket {
            previous: self.frame(state, previous_valid)?,
            next: self.frame(state, next_valid)?,
        };
        debug_assert!(bracket.previous.valid_time < bracket.next.valid_time);
        Ok(bracket)
    }
}

/// Substitute `{name}` placeholders in a file template.
///
/// Supported names: `cycle_date`, `cycle_hour`, `valid_date`, `valid_hour`,
/// `valid_month`, `fhr2`, `fhr3`.
pub fn render_template(
    template: &str,
    cycle: DateTime<Utc>,
    valid: DateTime<Utc>,
    forecast_hour: u32,
) -> std::result::Result<String, String> {
    let mut result = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }

        let mut name = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(format!("unclosed placeholder in template {:?}", template)),
            }
        }

        let value = match name.as_str() {
            "cycle_date" => cycle.format("%Y%m%d").to_string(),
            "cycle_hour" => cycle.format("%H").to_string(),
            "valid_date" => valid.format("%Y%m%d").to_string(),
            "valid_hour" => valid.format("%H").to_string(),
            "valid_month" => valid.format("%Y%m").to_string(),
            "fhr2" => format!("{:02}", forecast_hour),
            "fhr3" => format!("{:03}", forecast_hour),
            other => return Err(format!("unknown placeholder {{{}}} in template", other)),
        };
        result.push_str(&value);
    }

    Ok(result)
}
