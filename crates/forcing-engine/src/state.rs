//! Runtime state of one configured forcing product.
//!
//! A [`ForcingState`] is created once per product by
//! [`crate::registry::init_forcings`] and then handed by exclusive reference
//! to each pipeline stage on every output timestep. Buffer shapes are fixed
//! at construction: callers only ever get views, never the owned arrays.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3, ArrayView3, ArrayViewMut3};

use crate::config::ProductConfig;
use crate::error::{ForcingError, Result};
use crate::grid::GridMetadata;
use crate::options::ProcessingOptions;
use crate::product::{ProductKey, ProductSpec};

/// One input frame of a bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Where the file is expected on disk.
    pub path: PathBuf,
    /// Whether the file was present when the bracket was resolved.
    pub available: bool,
    /// Valid time of the frame.
    pub valid_time: DateTime<Utc>,
    /// Issuance cycle the frame belongs to.
    pub cycle_time: DateTime<Utc>,
    /// Lead time in hours, for forecast products only.
    pub forecast_hour: Option<u32>,
}

impl Frame {
    /// The file, if it has been located.
    pub fn file(&self) -> Option<&Path> {
        self.available.then_some(self.path.as_path())
    }
}

/// Which side of the bracket a buffer or frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSlot {
    Previous,
    Next,
}

impl FrameSlot {
    pub const BOTH: [FrameSlot; 2] = [FrameSlot::Previous, FrameSlot::Next];
}

/// The previous and next frames surrounding an output time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    pub previous: Frame,
    pub next: Frame,
}

impl Bracket {
    pub fn frame(&self, slot: FrameSlot) -> &Frame {
        match slot {
            FrameSlot::Previous => &self.previous,
            FrameSlot::Next => &self.next,
        }
    }

    /// True when `previous.valid_time <= now <= next.valid_time`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.previous.valid_time <= now && now <= self.next.valid_time
    }

    /// Both files are on disk.
    pub fn is_available(&self) -> bool {
        self.previous.available && self.next.available
    }

    /// Expected paths of frames that are not on disk yet.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        FrameSlot::BOTH
            .iter()
            .map(|&slot| self.frame(slot))
            .filter(|f| !f.available)
            .map(|f| f.path.clone())
            .collect()
    }
}

/// Which regridded buffers no longer match the recorded bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaleFrames {
    pub previous: bool,
    pub next: bool,
}

impl StaleFrames {
    pub const BOTH: StaleFrames = StaleFrames {
        previous: true,
        next: true,
    };

    pub fn any(&self) -> bool {
        self.previous || self.next
    }

    pub fn contains(&self, slot: FrameSlot) -> bool {
        match slot {
            FrameSlot::Previous => self.previous,
            FrameSlot::Next => self.next,
        }
    }

    pub fn count(&self) -> usize {
        usize::from(self.previous) + usize::from(self.next)
    }
}

/// Static inputs validated at initialization for the configured downscaling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryInputs {
    /// Precomputed temperature lapse-rate grid on the model domain.
    pub lapse_rate_grid: Option<PathBuf>,
}

/// Mutable record of one configured product.
#[derive(Debug)]
pub struct ForcingState {
    spec: &'static ProductSpec,
    pub input_dir: PathBuf,
    pub forecast_horizon_minutes: i64,
    pub cycle_offset_minutes: i64,
    pub output_frequency_minutes: i64,
    pub file_template: String,
    pub options: ProcessingOptions,
    auxiliary: AuxiliaryInputs,
    grid: GridMetadata,
    bracket: Option<Bracket>,
    stale: StaleFrames,
    regrid_complete: bool,
    regridded_forcings1: Array3<f64>,
    regridded_forcings2: Array3<f64>,
    final_forcings: Array3<f64>,
    height: Array2<f32>,
}

impl ForcingState {
    /// Allocate buffers for the local subdomain. Forcing buffers start as
    /// NaN so nothing downstream mistakes them for data.
    pub fn new(
        spec: &'static ProductSpec,
        config: &ProductConfig,
        auxiliary: AuxiliaryInputs,
        grid: &GridMetadata,
    ) -> Self {
        let shape = grid.forcing_shape();
        let file_template = config
            .file_template
            .clone()
            .unwrap_or_else(|| spec.file_template.to_string());

        Self {
            spec,
            input_dir: config.input_dir.clone(),
            forecast_horizon_minutes: config.forecast_horizon_minutes,
            cycle_offset_minutes: config.cycle_offset_minutes,
            output_frequency_minutes: config.output_frequency_minutes,
            file_template,
            options: config.options,
            auxiliary,
            grid: grid.clone(),
            bracket: None,
            stale: StaleFrames::BOTH,
            regrid_complete: false,
            regridded_forcings1: Array3::from_elem(shape, f64::NAN),
            regridded_forcings2: Array3::from_elem(shape, f64::NAN),
            final_forcings: Array3::from_elem(shape, f64::NAN),
            height: Array2::zeros(grid.local_shape()),
        }
    }

    pub fn spec(&self) -> &'static ProductSpec {
        self.spec
    }

    pub fn key(&self) -> ProductKey {
        self.spec.key
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn grid(&self) -> &GridMetadata {
        &self.grid
    }

    pub fn auxiliary(&self) -> &AuxiliaryInputs {
        &self.auxiliary
    }

    pub fn bracket(&self) -> Option<&Bracket> {
        self.bracket.as_ref()
    }

    pub fn stale_frames(&self) -> StaleFrames {
        self.stale
    }

    /// Both regridded buffers correspond to the recorded bracket.
    pub fn regrid_complete(&self) -> bool {
        self.regrid_complete
    }

    /// Record a newly resolved bracket and work out which buffers it
    /// invalidates.
    ///
    /// When the bracket advanced by exactly one frame (the new previous frame
    /// is the old next frame, already regridded) the buffers are rotated so
    /// only the next frame has to be regridded again.
    pub fn update_bracket(&mut self, bracket: Bracket) -> StaleFrames {
        let stale = match &self.bracket {
            Some(old) if *old == bracket => self.stale,
            Some(old) if bracket.previous == old.next && !self.stale.next => {
                std::mem::swap(&mut self.regridded_forcings1, &mut self.regridded_forcings2);
                StaleFrames {
                    previous: false,
                    next: true,
                }
            }
            Some(old) => StaleFrames {
                previous: self.stale.previous || bracket.previous != old.previous,
                next: self.stale.next || bracket.next != old.next,
            },
            None => StaleFrames::BOTH,
        };

        self.bracket = Some(bracket);
        self.stale = stale;
        self.regrid_complete = !stale.any();
        stale
    }

    /// Record that `slot` now holds the regridded frame of the current bracket.
    pub fn mark_regridded(&mut self, slot: FrameSlot) {
        match slot {
            FrameSlot::Previous => self.stale.previous = false,
            FrameSlot::Next => self.stale.next = false,
        }
        self.regrid_complete = !self.stale.any();
    }

    /// Fails unless the recorded bracket surrounds `now`.
    pub fn check_bracket(&self, now: DateTime<Utc>) -> Result<&Bracket> {
        let bracket = self.bracket.as_ref().ok_or_else(|| ForcingError::MalformedRequest {
            product: self.name().to_string(),
            reason: "no bracket has been resolved".to_string(),
        })?;

        if !bracket.contains(now) {
            return Err(ForcingError::BracketViolation {
                product: self.name().to_string(),
                now,
                previous: bracket.previous.valid_time,
                next: bracket.next.valid_time,
            });
        }
        Ok(bracket)
    }

    pub fn regridded(&self, slot: FrameSlot) -> ArrayView3<'_, f64> {
        match slot {
            FrameSlot::Previous => self.regridded_forcings1.view(),
            FrameSlot::Next => self.regridded_forcings2.view(),
        }
    }

    pub fn regridded_mut(&mut self, slot: FrameSlot) -> ArrayViewMut3<'_, f64> {
        match slot {
            FrameSlot::Previous => self.regridded_forcings1.view_mut(),
            FrameSlot::Next => self.regridded_forcings2.view_mut(),
        }
    }

    /// Output for the current timestep, shape `[8, ny_local, nx_local]`.
    pub fn final_forcings(&self) -> ArrayView3<'_, f64> {
        self.final_forcings.view()
    }

    pub fn final_forcings_mut(&mut self) -> ArrayViewMut3<'_, f64> {
        self.final_forcings.view_mut()
    }

    /// Previous frame, next frame and output buffer, borrowed together.
    pub fn interpolation_buffers(
        &mut self,
    ) -> (ArrayView3<'_, f64>, ArrayView3<'_, f64>, ArrayViewMut3<'_, f64>) {
        (
            self.regridded_forcings1.view(),
            self.regridded_forcings2.view(),
            self.final_forcings.view_mut(),
        )
    }

    /// Overwrite the output with a missing-data marker.
    pub fn fill_final(&mut self, value: f64) {
        self.final_forcings.fill(value);
    }

    pub fn height(&self) -> &Array2<f32> {
        &self.height
    }
}
