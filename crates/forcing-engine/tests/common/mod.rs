//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use forcing_engine::{
    init_forcings, FrameRegridder, ForcingConfig, ForcingError, ForcingState, FrameSlot,
    GridMetadata, ProductKey, RegridRequest,
};
use ndarray::ArrayViewMut3;
use test_utils::{fixtures, InputTree};

/// Value written by [`MockRegridder`] for a frame valid at `valid`.
pub fn frame_value(valid: DateTime<Utc>) -> f64 {
    100.0 + 10.0 * (valid - fixtures::times::reference_cycle()).num_minutes() as f64 / 60.0
}

/// One recorded regrid call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegridCall {
    pub product: ProductKey,
    pub slot: FrameSlot,
    pub valid_time: DateTime<Utc>,
}

/// Fills every cell with [`frame_value`] of the frame and records the call.
#[derive(Debug, Clone, Default)]
pub struct MockRegridder {
    pub calls: Arc<Mutex<Vec<RegridCall>>>,
    pub fail: bool,
}

impl MockRegridder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RegridCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl FrameRegridder for MockRegridder {
    fn regrid_frame(
        &mut self,
        request: RegridRequest<'_>,
        mut output: ArrayViewMut3<'_, f64>,
    ) -> forcing_engine::Result<()> {
        if self.fail {
            return Err(ForcingError::Decode {
                path: request.path.to_path_buf(),
                reason: "corrupt message".to_string(),
            });
        }
        assert_eq!(output.shape(), &request.grid.forcing_shape()[..]);
        output.fill(frame_value(request.frame.valid_time));
        self.calls.lock().unwrap().push(RegridCall {
            product: request.spec.key,
            slot: request.slot,
            valid_time: request.frame.valid_time,
        });
        Ok(())
    }
}

/// Relative path of an HRRR file of the 00Z reference cycle.
pub fn hrrr_file(fhr: u32) -> String {
    format!("hrrr.20240115/conus/hrrr.t00z.wrfsfcf{:02}.grib2", fhr)
}

/// States for a single product read from `tree`, with the given
/// interpolation mode swapped into the fixture configuration.
pub fn single_product_states(
    key: ProductKey,
    tree: &InputTree,
    interpolation: u8,
) -> (GridMetadata, BTreeMap<ProductKey, ForcingState>) {
    let yaml = fixtures::config::single_product(key.code(), tree.path()).replace(
        "temporal_interpolation: [2]",
        &format!("temporal_interpolation: [{}]", interpolation),
    );
    let config = ForcingConfig::from_yaml_str(&yaml).unwrap();
    let grid = GridMetadata::serial(config.grid.nx_global, config.grid.ny_global);
    let states = init_forcings(&config, &grid).unwrap();
    (grid, states)
}
