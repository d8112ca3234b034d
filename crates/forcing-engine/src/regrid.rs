//! Projection of raw frames onto the local model subdomain.
//!
//! Decoding and spatial interpolation live behind [`FrameRegridder`]; the
//! engine only decides which bracket frames are stale and hands each one to
//! the regridder together with the buffer it must fill.

use std::path::Path;

use ndarray::{ArrayView2, ArrayViewMut3, Axis};
use tracing::debug;

use crate::error::{ForcingError, Result};
use crate::grid::{DomainDecomposition, GridMetadata};
use crate::options::RegridMethod;
use crate::product::{ProductSpec, NUM_FORCING_VARIABLES};
use crate::state::{ForcingState, Frame, FrameSlot};

/// Everything a regridder needs to process one frame.
#[derive(Debug, Clone, Copy)]
pub struct RegridRequest<'a> {
    pub spec: &'static ProductSpec,
    pub method: RegridMethod,
    pub slot: FrameSlot,
    pub frame: &'a Frame,
    pub path: &'a Path,
    pub grid: &'a GridMetadata,
    pub decomposition: &'a DomainDecomposition,
}

/// Decodes one input file and writes all eight variables, in canonical
/// order, onto the local subdomain.
pub trait FrameRegridder {
    fn regrid_frame(
        &mut self,
        request: RegridRequest<'_>,
        output: ArrayViewMut3<'_, f64>,
    ) -> Result<()>;
}

impl<R: FrameRegridder + ?Sized> FrameRegridder for Box<R> {
    fn regrid_frame(
        &mut self,
        request: RegridRequest<'_>,
        output: ArrayViewMut3<'_, f64>,
    ) -> Result<()> {
        (**self).regrid_frame(request, output)
    }
}

/// Regrid every stale frame of the recorded bracket.
///
/// Returns the number of frames that were regridded; zero when both buffers
/// already match the bracket.
pub fn regrid_inputs<R: FrameRegridder + ?Sized>(
    regridder: &mut R,
    state: &mut ForcingState,
    grid: &GridMetadata,
    decomposition: &DomainDecomposition,
) -> Result<usize> {
    if state.regrid_complete() {
        return Ok(0);
    }

    let bracket = state
        .bracket()
        .cloned()
        .ok_or_else(|| ForcingError::regrid(state.name(), "no bracket has been resolved"))?;

    let spec = state.spec();
    let method = state.options.regrid;
    let stale = state.stale_frames();
    let mut regridded = 0;

    for slot in FrameSlot::BOTH {
        if !stale.contains(slot) {
            continue;
        }

        let frame = bracket.frame(slot);
        let path = frame.file().ok_or_else(|| {
            ForcingError::regrid(
                spec.name,
                format!("{} is not available", frame.path.display()),
            )
        })?;

        debug!(
            product = %spec.name,
            slot = ?slot,
            file = %path.display(),
            method = ?method,
            "Regridding frame"
        );

        let request = RegridRequest {
            spec,
            method,
            slot,
            frame,
            path,
            grid,
            decomposition,
        };
        regridder.regrid_frame(request, state.regridded_mut(slot))?;
        state.mark_regridded(slot);
        regridded += 1;
    }

    Ok(regridded)
}

/// Write decoded source fields into the canonical output vector using the
/// product's output index map. Products without a field table must already
/// deliver fields in canonical order.
pub fn place_fields(
    spec: &ProductSpec,
    fields: &[ArrayView2<'_, f64>],
    mut output: ArrayViewMut3<'_, f64>,
) -> Result<()> {
    let targets = spec
        .output_index_map()
        .unwrap_or_else(|| (0..NUM_FORCING_VARIABLES).collect());

    if fields.len() != targets.len() {
        return Err(ForcingError::regrid(
            spec.name,
            format!("expected {} fields, got {}", targets.len(), fields.len()),
        ));
    }

    let plane = [output.shape()[1], output.shape()[2]];
    for (field, &target) in fields.iter().zip(&targets) {
        if field.shape() != &plane[..] {
            return Err(ForcingError::ShapeMismatch {
                expected: plane.to_vec(),
                actual: field.shape().to_vec(),
            });
        }
        output.index_axis_mut(Axis(0), target).assign(field);
    }
    Ok(())
}
