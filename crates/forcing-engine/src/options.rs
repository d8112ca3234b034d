//! Per-product processing options.
//!
//! Options are written as small integer codes in configuration files and
//! converted eagerly, so an unsupported code fails while loading.

use serde::{Deserialize, Serialize};

use crate::error::ForcingError;

/// Declares a `u8`-coded option enum with serde and `TryFrom<u8>` support.
macro_rules! coded_option {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Code used in configuration files.
            pub fn code(self) -> u8 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ForcingError;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(ForcingError::invalid_config(format!(
                        "unsupported {} option: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(option: $name) -> u8 {
                option.code()
            }
        }
    };
}

coded_option! {
    /// How the two regridded frames are blended into the output field.
    TemporalInterpolation {
        /// Use the next frame as-is.
        None = 0,
        /// Use whichever frame is closer in time; ties go to the next frame.
        NearestNeighbor = 1,
        /// Linear weighting by distance from each frame.
        WeightedAverage = 2,
    }
}

coded_option! {
    /// Spatial interpolation used when projecting onto the model grid.
    RegridMethod {
        Bilinear = 1,
        NearestNeighbor = 2,
        Conservative = 3,
    }
}

coded_option! {
    TemperatureDownscaling {
        None = 0,
        /// Constant environmental lapse rate.
        SimpleLapseRate = 1,
        /// Precomputed lapse-rate grid on the model domain.
        LapseRateGrid = 2,
    }
}

coded_option! {
    HumidityDownscaling {
        None = 0,
        /// Recompute from downscaled temperature and pressure.
        ThermodynamicAdjustment = 1,
    }
}

coded_option! {
    PressureDownscaling {
        None = 0,
        Hydrostatic = 1,
    }
}

coded_option! {
    PrecipitationDownscaling {
        None = 0,
        MountainMapper = 1,
    }
}

coded_option! {
    ShortwaveDownscaling {
        None = 0,
        TopographicAdjustment = 1,
    }
}

coded_option! {
    LongwaveDownscaling {
        None = 0,
        ElevationAdjustment = 1,
    }
}

coded_option! {
    BiasCorrection {
        None = 0,
        Climatology = 1,
        Custom = 2,
    }
}

/// Downscaling choice for each downscalable variable group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownscaleOptions {
    pub temperature: TemperatureDownscaling,
    pub humidity: HumidityDownscaling,
    pub pressure: PressureDownscaling,
    pub precipitation: PrecipitationDownscaling,
    pub shortwave: ShortwaveDownscaling,
    pub longwave: LongwaveDownscaling,
}

impl Default for DownscaleOptions {
    fn default() -> Self {
        Self {
            temperature: TemperatureDownscaling::None,
            humidity: HumidityDownscaling::None,
            pressure: PressureDownscaling::None,
            precipitation: PrecipitationDownscaling::None,
            shortwave: ShortwaveDownscaling::None,
            longwave: LongwaveDownscaling::None,
        }
    }
}

impl DownscaleOptions {
    pub fn is_none(&self) -> bool {
        *self == Self::default()
    }
}

/// Bias-correction choice for each correctable variable group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiasCorrectionOptions {
    pub temperature: BiasCorrection,
    pub humidity: BiasCorrection,
    pub wind: BiasCorrection,
    pub precipitation: BiasCorrection,
    pub shortwave: BiasCorrection,
    pub longwave: BiasCorrection,
    pub pressure: BiasCorrection,
}

impl Default for BiasCorrectionOptions {
    fn default() -> Self {
        Self {
            temperature: BiasCorrection::None,
            humidity: BiasCorrection::None,
            wind: BiasCorrection::None,
            precipitation: BiasCorrection::None,
            shortwave: BiasCorrection::None,
            longwave: BiasCorrection::None,
            pressure: BiasCorrection::None,
        }
    }
}

impl BiasCorrectionOptions {
    pub fn is_none(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything a product's processing path is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOptions {
    pub temporal_interpolation: TemporalInterpolation,
    pub regrid: RegridMethod,
    pub downscale: DownscaleOptions,
    pub bias_correction: BiasCorrectionOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for code in 0..=2u8 {
            assert_eq!(TemporalInterpolation::try_from(code).unwrap().code(), code);
            assert_eq!(BiasCorrection::try_from(code).unwrap().code(), code);
        }
        assert_eq!(
            TemperatureDownscaling::try_from(2).unwrap(),
            TemperatureDownscaling::LapseRateGrid
        );
    }

    #[test]
    fn test_unsupported_code() {
        let err = TemporalInterpolation::try_from(3).unwrap_err();
        assert!(err.to_string().contains("TemporalInterpolation"));
        assert!(RegridMethod::try_from(0).is_err());
        assert!(PressureDownscaling::try_from(7).is_err());
    }

    #[test]
    fn test_serde_codes() {
        let mode: TemporalInterpolation = serde_yaml::from_str("2").unwrap();
        assert_eq!(mode, TemporalInterpolation::WeightedAverage);
        assert!(serde_yaml::from_str::<TemporalInterpolation>("9").is_err());
    }

    #[test]
    fn test_defaults_are_none() {
        assert!(DownscaleOptions::default().is_none());
        assert!(BiasCorrectionOptions::default().is_none());

        let opts = DownscaleOptions {
            pressure: PressureDownscaling::Hydrostatic,
            ..DownscaleOptions::default()
        };
        assert!(!opts.is_none());
    }
}
