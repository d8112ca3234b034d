//! Building the runtime state of every configured product.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ForcingConfig;
use crate::error::{ForcingError, Result};
use crate::grid::GridMetadata;
use crate::options::{DownscaleOptions, TemperatureDownscaling};
use crate::product::{define_product, ProductKey, ProductSpec};
use crate::state::{AuxiliaryInputs, ForcingState};

/// Expected location of a product's precomputed lapse-rate grid.
pub fn lapse_rate_path(param_dir: &Path, spec: &ProductSpec) -> PathBuf {
    param_dir.join(format!("T2M_Lapse_Rate_{}.nc", spec.name))
}

/// Create one [`ForcingState`] per configured product, keyed by product.
///
/// Every static input required by a configured downscaling option is
/// checked here, so a missing file fails the run before the first timestep.
pub fn init_forcings(
    config: &ForcingConfig,
    grid: &GridMetadata,
) -> Result<BTreeMap<ProductKey, ForcingState>> {
    let mut states = BTreeMap::new();

    for product in config.product_configs()? {
        let spec = define_product(product.key.code())?;
        let auxiliary = resolve_auxiliary(
            spec,
            &product.options.downscale,
            config.downscale_param_dir.as_deref(),
        )?;

        info!(
            product = %spec.name,
            key = spec.key.code(),
            encoding = %spec.encoding,
            input_dir = %product.input_dir.display(),
            interpolation = ?product.options.temporal_interpolation,
            "Initialized forcing product"
        );

        let state = ForcingState::new(spec, &product, auxiliary, grid);
        if states.insert(spec.key, state).is_some() {
            return Err(ForcingError::invalid_config(format!(
                "product {} is configured more than once",
                spec.name
            )));
        }
    }

    Ok(states)
}

fn resolve_auxiliary(
    spec: &ProductSpec,
    downscale: &DownscaleOptions,
    param_dir: Option<&Path>,
) -> Result<AuxiliaryInputs> {
    let mut auxiliary = AuxiliaryInputs::default();

    if downscale.temperature == TemperatureDownscaling::LapseRateGrid {
        let option = format!("{:?}", downscale.temperature);
        let param_dir = param_dir.ok_or_else(|| {
            ForcingError::invalid_config(format!(
                "{}: {} requires downscale_param_dir",
                spec.name, option
            ))
        })?;

        let path = lapse_rate_path(param_dir, spec);
        if !path.is_file() {
            return Err(ForcingError::MissingAuxiliaryInput {
                product: spec.name.to_string(),
                option,
                path,
            });
        }
        auxiliary.lapse_rate_grid = Some(path);
    }

    Ok(auxiliary)
}
