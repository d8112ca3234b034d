//! Forcing configuration.
//!
//! Per-product settings are parallel lists indexed by configured position
//! (not by product key). Optional option lists may be omitted entirely, in
//! which case every product gets the "none" option.
//!
//! Environment variables can be referenced as `${VAR}` or `${VAR:-default}`
//! anywhere in the file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForcingError, Result};
use crate::options::{
    BiasCorrection, BiasCorrectionOptions, DownscaleOptions, HumidityDownscaling,
    LongwaveDownscaling, PrecipitationDownscaling, PressureDownscaling, ProcessingOptions,
    RegridMethod, ShortwaveDownscaling, TemperatureDownscaling, TemporalInterpolation,
};
use crate::product::ProductKey;

/// Top-level forcing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcingConfig {
    pub input_forcings: Vec<ProductKey>,
    pub input_dirs: Vec<PathBuf>,
    /// Minutes.
    pub forecast_horizons: Vec<i64>,
    /// Minutes.
    pub cycle_offsets: Vec<i64>,
    pub temporal_interpolation: Vec<TemporalInterpolation>,
    #[serde(default)]
    pub regrid_methods: Vec<RegridMethod>,
    /// Per-product override of `output_frequency_minutes`.
    #[serde(default)]
    pub output_frequencies: Vec<i64>,
    /// Per-product override of the default file naming.
    #[serde(default)]
    pub file_templates: Vec<Option<String>>,
    #[serde(default)]
    pub downscaling: DownscalingConfig,
    #[serde(default)]
    pub bias_correction: BiasCorrectionConfig,

    pub output_frequency_minutes: i64,
    #[serde(default)]
    pub downscale_param_dir: Option<PathBuf>,
    pub grid: GridConfig,
    /// Written into the output of a product that was skipped.
    #[serde(default = "default_missing_value")]
    pub missing_value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownscalingConfig {
    #[serde(default)]
    pub temperature: Vec<TemperatureDownscaling>,
    #[serde(default)]
    pub humidity: Vec<HumidityDownscaling>,
    #[serde(default)]
    pub pressure: Vec<PressureDownscaling>,
    #[serde(default)]
    pub precipitation: Vec<PrecipitationDownscaling>,
    #[serde(default)]
    pub shortwave: Vec<ShortwaveDownscaling>,
    #[serde(default)]
    pub longwave: Vec<LongwaveDownscaling>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiasCorrectionConfig {
    #[serde(default)]
    pub temperature: Vec<BiasCorrection>,
    #[serde(default)]
    pub humidity: Vec<BiasCorrection>,
    #[serde(default)]
    pub wind: Vec<BiasCorrection>,
    #[serde(default)]
    pub precipitation: Vec<BiasCorrection>,
    #[serde(default)]
    pub shortwave: Vec<BiasCorrection>,
    #[serde(default)]
    pub longwave: Vec<BiasCorrection>,
    #[serde(default)]
    pub pressure: Vec<BiasCorrection>,
}

/// Global extents of the hydrologic model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub nx_global: usize,
    pub ny_global: usize,
}

fn default_missing_value() -> f64 {
    f64::NAN
}

/// Settings of one configured product, gathered from the parallel lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductConfig {
    pub key: ProductKey,
    pub input_dir: PathBuf,
    pub forecast_horizon_minutes: i64,
    pub cycle_offset_minutes: i64,
    pub output_frequency_minutes: i64,
    pub file_template: Option<String>,
    pub options: ProcessingOptions,
}

impl ForcingConfig {
    /// Read, expand and parse a configuration file. The result is validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: ForcingConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of configured products.
    pub fn len(&self) -> usize {
        self.input_forcings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_forcings.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        if n == 0 {
            return Err(ForcingError::invalid_config("no input forcings configured"));
        }

        let mut seen = HashSet::new();
        for key in &self.input_forcings {
            if !seen.insert(*key) {
                return Err(ForcingError::invalid_config(format!(
                    "product {} ({}) is configured more than once",
                    key.code(),
                    key
                )));
            }
        }

        require_len("input_dirs", self.input_dirs.len(), n)?;
        require_len("forecast_horizons", self.forecast_horizons.len(), n)?;
        require_len("cycle_offsets", self.cycle_offsets.len(), n)?;
        require_len("temporal_interpolation", self.temporal_interpolation.len(), n)?;

        optional_len("regrid_methods", self.regrid_methods.len(), n)?;
        optional_len("output_frequencies", self.output_frequencies.len(), n)?;
        optional_len("file_templates", self.file_templates.len(), n)?;

        let ds = &self.downscaling;
        optional_len("downscaling.temperature", ds.temperature.len(), n)?;
        optional_len("downscaling.humidity", ds.humidity.len(), n)?;
        optional_len("downscaling.pressure", ds.pressure.len(), n)?;
        optional_len("downscaling.precipitation", ds.precipitation.len(), n)?;
        optional_len("downscaling.shortwave", ds.shortwave.len(), n)?;
        optional_len("downscaling.longwave", ds.longwave.len(), n)?;

        let bc = &self.bias_correction;
        optional_len("bias_correction.temperature", bc.temperature.len(), n)?;
        optional_len("bias_correction.humidity", bc.humidity.len(), n)?;
        optional_len("bias_correction.wind", bc.wind.len(), n)?;
        optional_len("bias_correction.precipitation", bc.precipitation.len(), n)?;
        optional_len("bias_correction.shortwave", bc.shortwave.len(), n)?;
        optional_len("bias_correction.longwave", bc.longwave.len(), n)?;
        optional_len("bias_correction.pressure", bc.pressure.len(), n)?;

        if self.output_frequency_minutes <= 0 {
            return Err(ForcingError::invalid_config(format!(
                "output_frequency_minutes must be positive, got {}",
                self.output_frequency_minutes
            )));
        }
        if let Some(freq) = self.output_frequencies.iter().find(|&&f| f <= 0) {
            return Err(ForcingError::invalid_config(format!(
                "output frequencies must be positive, got {}",
                freq
            )));
        }
        if let Some(h) = self.forecast_horizons.iter().find(|&&h| h < 0) {
            return Err(ForcingError::invalid_config(format!(
                "forecast horizons cannot be negative, got {}",
                h
            )));
        }
        if let Some(o) = self.cycle_offsets.iter().find(|&&o| o < 0) {
            return Err(ForcingError::invalid_config(format!(
                "cycle offsets cannot be negative, got {}",
                o
            )));
        }
        if self.grid.nx_global == 0 || self.grid.ny_global == 0 {
            return Err(ForcingError::invalid_config("grid dimensions must be non-zero"));
        }

        Ok(())
    }

    /// Per-product settings in configured order.
    pub fn product_configs(&self) -> Result<Vec<ProductConfig>> {
        self.validate()?;

        let ds = &self.downscaling;
        let bc = &self.bias_correction;

        let products = self
            .input_forcings
            .iter()
            .enumerate()
            .map(|(i, &key)| ProductConfig {
                key,
                input_dir: self.input_dirs[i].clone(),
                forecast_horizon_minutes: self.forecast_horizons[i],
                cycle_offset_minutes: self.cycle_offsets[i],
                output_frequency_minutes: option_at(
                    &self.output_frequencies,
                    i,
                    self.output_frequency_minutes,
                ),
                file_template: self.file_templates.get(i).cloned().flatten(),
                options: ProcessingOptions {
                    temporal_interpolation: self.temporal_interpolation[i],
                    regrid: option_at(&self.regrid_methods, i, RegridMethod::Bilinear),
                    downscale: DownscaleOptions {
                        temperature: option_at(&ds.temperature, i, TemperatureDownscaling::None),
                        humidity: option_at(&ds.humidity, i, HumidityDownscaling::None),
                        pressure: option_at(&ds.pressure, i, PressureDownscaling::None),
                        precipitation: option_at(
                            &ds.precipitation,
                            i,
                            PrecipitationDownscaling::None,
                        ),
                        shortwave: option_at(&ds.shortwave, i, ShortwaveDownscaling::None),
                        longwave: option_at(&ds.longwave, i, LongwaveDownscaling::None),
                    },
                    bias_correction: BiasCorrectionOptions {
                        temperature: option_at(&bc.temperature, i, BiasCorrection::None),
                        humidity: option_at(&bc.humidity, i, BiasCorrection::None),
                        wind: option_at(&bc.wind, i, BiasCorrection::None),
                        precipitation: option_at(&bc.precipitation, i, BiasCorrection::None),
                        shortwave: option_at(&bc.shortwave, i, BiasCorrection::None),
                        longwave: option_at(&bc.longwave, i, BiasCorrection::None),
                        pressure: option_at(&bc.pressure, i, BiasCorrection::None),
                    },
                },
            })
            .collect();

        Ok(products)
    }
}

fn require_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(ForcingError::invalid_config(format!(
            "{} has {} entries, expected {}",
            name, len, expected
        )));
    }
    Ok(())
}

fn optional_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    require_len(name, len, expected)
}

fn option_at<T: Copy>(list: &[T], i: usize, default: T) -> T {
    list.get(i).copied().unwrap_or(default)
}

/// Expand `${VAR}` and `${VAR:-default}` references.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(ForcingError::invalid_config(format!(
                            "unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            ForcingError::invalid_config(format!("environment variable {} not set", expr))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PRODUCTS: &str = r#"
input_forcings: [5, 3]
input_dirs: [/data/hrrr, /data/gfs]
forecast_horizons: [1080, 14400]
cycle_offsets: [0, 360]
temporal_interpolation: [2, 1]
output_frequency_minutes: 60
grid:
  nx_global: 40
  ny_global: 30
downscaling:
  temperature: [2, 0]
bias_correction:
  wind: [0, 1]
"#;

    #[test]
    fn test_parse_and_zip_products() {
        let config = ForcingConfig::from_yaml_str(TWO_PRODUCTS).unwrap();
        assert_eq!(config.len(), 2);
        assert!(config.missing_value.is_nan());

        let products = config.product_configs().unwrap();
        assert_eq!(products[0].key, ProductKey::Hrrr);
        assert_eq!(products[1].key, ProductKey::Gfs);
        assert_eq!(products[1].cycle_offset_minutes, 360);
        assert_eq!(products[1].output_frequency_minutes, 60);
        assert_eq!(
            products[0].options.temporal_interpolation,
            TemporalInterpolation::WeightedAverage
        );
        assert_eq!(
            products[0].options.downscale.temperature,
            TemperatureDownscaling::LapseRateGrid
        );
        assert_eq!(products[0].options.bias_correction.wind, BiasCorrection::None);
        assert_eq!(products[1].options.bias_correction.wind, BiasCorrection::Climatology);
        assert_eq!(products[1].options.regrid, RegridMethod::Bilinear);
        assert!(products[1].file_template.is_none());
    }

    #[test]
    fn test_unknown_product_key_fails_at_load() {
        let yaml = TWO_PRODUCTS.replace("[5, 3]", "[5, 42]");
        let err = ForcingConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ForcingError::ConfigParse(_)));
        assert!(err.to_string().contains("unknown forcing product key"), "{}", err);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let yaml = TWO_PRODUCTS.replace("[5, 3]", "[5, 5]");
        let err = ForcingConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_list_length_mismatch() {
        let yaml = TWO_PRODUCTS.replace("cycle_offsets: [0, 360]", "cycle_offsets: [0]");
        let err = ForcingConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("cycle_offsets"));

        let yaml = TWO_PRODUCTS.replace("wind: [0, 1]", "wind: [0, 1, 1]");
        assert!(ForcingConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_non_positive_output_frequency() {
        let yaml = TWO_PRODUCTS.replace("output_frequency_minutes: 60", "output_frequency_minutes: 0");
        assert!(ForcingConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("FORCING_TEST_HRRR_DIR", "/scratch/hrrr");
        let yaml = TWO_PRODUCTS.replace(
            "[/data/hrrr, /data/gfs]",
            "[\"${FORCING_TEST_HRRR_DIR}\", \"${FORCING_TEST_UNSET_DIR:-/data/gfs}\"]",
        );
        let config = ForcingConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.input_dirs[0], PathBuf::from("/scratch/hrrr"));
        assert_eq!(config.input_dirs[1], PathBuf::from("/data/gfs"));
    }

    #[test]
    fn test_unset_env_var_is_an_error() {
        assert!(expand_env_vars("dir: ${FORCING_TEST_DEFINITELY_UNSET}").is_err());
        assert!(expand_env_vars("dir: ${UNCLOSED").is_err());
    }
}
