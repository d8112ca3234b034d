//! Temporal interpolation between the two regridded bracket frames.

use chrono::{DateTime, Utc};
use ndarray::{ArrayView3, ArrayViewMut3, Zip};

use crate::error::{ForcingError, Result};
use crate::options::TemporalInterpolation;
use crate::state::{ForcingState, FrameSlot};

impl TemporalInterpolation {
    /// Blend the regridded frames of `state` into its output buffer.
    ///
    /// Requires a resolved bracket and both buffers regridded. The weighted
    /// average additionally needs a positive output frequency.
    ///
    /// `now` is not checked against the bracket here; the engine does that
    /// before regridding. Nearest neighbour outside the bracket picks the
    /// closer frame.
    pub fn interpolate(self, state: &mut ForcingState, now: DateTime<Utc>) -> Result<()> {
        let product = state.name();
        if !state.regrid_complete() {
            return Err(precondition(product, "regridded frames do not match the bracket"));
        }

        let bracket = state
            .bracket()
            .ok_or_else(|| precondition(product, "no bracket has been resolved"))?;
        let previous = bracket.previous.valid_time;
        let next = bracket.next.valid_time;
        let output_frequency = state.output_frequency_minutes;

        match self {
            Self::None => {
                let (_, next_frame, output) = state.interpolation_buffers();
                no_interpolation(next_frame, output);
            }
            Self::NearestNeighbor => {
                let (previous_frame, next_frame, output) = state.interpolation_buffers();
                nearest_neighbor(now, previous, next, previous_frame, next_frame, output);
            }
            Self::WeightedAverage => {
                let (w1, w2) = interpolation_weights(now, previous, next, output_frequency)
                    .ok_or_else(|| {
                        precondition(product, "output frequency must be positive for weighting")
                    })?;
                let (previous_frame, next_frame, output) = state.interpolation_buffers();
                weighted_average(previous_frame, next_frame, w1, w2, output);
            }
        }
        Ok(())
    }
}

fn precondition(product: &str, reason: &str) -> ForcingError {
    ForcingError::InterpolationPrecondition {
        product: product.to_string(),
        reason: reason.to_string(),
    }
}

/// Copy the next frame into the output.
pub fn no_interpolation(next: ArrayView3<'_, f64>, mut output: ArrayViewMut3<'_, f64>) {
    output.assign(&next);
}

/// Which frame is closer to `now`. Ties go to the next frame.
pub fn nearest_slot(now: DateTime<Utc>, previous: DateTime<Utc>, next: DateTime<Utc>) -> FrameSlot {
    let dt_previous = (now - previous).num_milliseconds().abs();
    let dt_next = (next - now).num_milliseconds().abs();
    if dt_next <= dt_previous {
        FrameSlot::Next
    } else {
        FrameSlot::Previous
    }
}

/// Copy whichever frame is closer in time into the output.
pub fn nearest_neighbor(
    now: DateTime<Utc>,
    previous_time: DateTime<Utc>,
    next_time: DateTime<Utc>,
    previous: ArrayView3<'_, f64>,
    next: ArrayView3<'_, f64>,
    mut output: ArrayViewMut3<'_, f64>,
) {
    match nearest_slot(now, previous_time, next_time) {
        FrameSlot::Previous => output.assign(&previous),
        FrameSlot::Next => output.assign(&next),
    }
}

/// Weights for the previous and next frames.
///
/// `w1 = 1 - (now - previous) / out_freq` and `w2 = 1 - (next - now) / out_freq`.
/// Both differences are non-negative inside the bracket, so the midpoint of
/// a regular bracket gets 0.5 and 0.5.
/// When the frame spacing equals the output frequency the weights sum to
/// one; otherwise they are applied as computed. `None` for a non-positive
/// output frequency.
pub fn interpolation_weights(
    now: DateTime<Utc>,
    previous: DateTime<Utc>,
    next: DateTime<Utc>,
    output_frequency_minutes: i64,
) -> Option<(f64, f64)> {
    if output_frequency_minutes <= 0 {
        return None;
    }
    let period = (output_frequency_minutes * 60) as f64;
    let dt_previous = (now - previous).num_milliseconds() as f64 / 1000.0;
    let dt_next = (next - now).num_milliseconds() as f64 / 1000.0;
    Some((1.0 - dt_previous / period, 1.0 - dt_next / period))
}

/// `output = previous * w1 + next * w2`, element-wise.
pub fn weighted_average(
    previous: ArrayView3<'_, f64>,
    next: ArrayView3<'_, f64>,
    w1: f64,
    w2: f64,
    output: ArrayViewMut3<'_, f64>,
) {
    Zip::from(output)
        .and(previous)
        .and(next)
        .par_for_each(|out, &a, &b| {
            *out = a * w1 + b * w2;
        });
}
