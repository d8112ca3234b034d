//! Product registry: immutable metadata for every supported forcing product.
//!
//! A product is identified by a small integer key in configuration files.
//! Keys are converted eagerly with [`ProductKey::try_from`] so that an
//! unsupported key is rejected while the configuration is loaded, never on
//! first use.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ForcingError, Result};

/// Number of slots in the canonical output vector.
pub const NUM_FORCING_VARIABLES: usize = 8;

/// Slots of the canonical output vector, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForcingVariable {
    /// 2 m air temperature.
    T2d,
    /// 2 m specific humidity.
    Q2d,
    /// 10 m zonal wind.
    U10,
    /// 10 m meridional wind.
    V10,
    /// Precipitation rate.
    Prate,
    /// Incoming shortwave radiation.
    Swdown,
    /// Incoming longwave radiation.
    Lwdown,
    /// Surface pressure.
    Psfc,
}

impl ForcingVariable {
    /// All variables in output order.
    pub const ALL: [ForcingVariable; NUM_FORCING_VARIABLES] = [
        Self::T2d,
        Self::Q2d,
        Self::U10,
        Self::V10,
        Self::Prate,
        Self::Swdown,
        Self::Lwdown,
        Self::Psfc,
    ];

    /// Position in the output vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in model forcing files.
    pub fn name(self) -> &'static str {
        match self {
            Self::T2d => "T2D",
            Self::Q2d => "Q2D",
            Self::U10 => "U10",
            Self::V10 => "V10",
            Self::Prate => "PRATE",
            Self::Swdown => "SWDOWN",
            Self::Lwdown => "LWDOWN",
            Self::Psfc => "PSFC",
        }
    }
}

impl fmt::Display for ForcingVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File encoding of a product's raw files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Grib1,
    Grib2,
    Netcdf,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grib1 => write!(f, "GRIB1"),
            Self::Grib2 => write!(f, "GRIB2"),
            Self::Netcdf => write!(f, "NetCDF"),
        }
    }
}

/// Whether a product is an analysis (one frame per valid time) or a
/// forecast run (frames at increasing lead times from an issuance cycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    Analysis,
    Forecast,
}

/// Supported forcing products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ProductKey {
    Nldas2 = 1,
    Narr = 2,
    Gfs = 3,
    NamNest = 4,
    Hrrr = 5,
    Rap = 6,
    Cfsv2 = 7,
    WrfArwHawaii = 8,
    Gfs025 = 9,
    CustomNetcdf = 10,
}

impl ProductKey {
    /// Every supported key in ascending order.
    pub const ALL: [ProductKey; 10] = [
        Self::Nldas2,
        Self::Narr,
        Self::Gfs,
        Self::NamNest,
        Self::Hrrr,
        Self::Rap,
        Self::Cfsv2,
        Self::WrfArwHawaii,
        Self::Gfs025,
        Self::CustomNetcdf,
    ];

    /// Numeric key as written in configuration.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Static metadata for this product.
    pub fn spec(self) -> &'static ProductSpec {
        match self {
            Self::Nldas2 => &NLDAS2,
            Self::Narr => &NARR,
            Self::Gfs => &GFS,
            Self::NamNest => &NAM_NEST,
            Self::Hrrr => &HRRR,
            Self::Rap => &RAP,
            Self::Cfsv2 => &CFSV2,
            Self::WrfArwHawaii => &WRF_ARW_HAWAII,
            Self::Gfs025 => &GFS_025,
            Self::CustomNetcdf => &CUSTOM_NETCDF,
        }
    }
}

impl TryFrom<u8> for ProductKey {
    type Error = ForcingError;

    fn try_from(code: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.code() == code)
            .ok_or(ForcingError::UnknownProductKey(code))
    }
}

impl From<ProductKey> for u8 {
    fn from(key: ProductKey) -> u8 {
        key.code()
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// One variable as stored in the source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceField {
    /// GRIB short name (e.g. "TMP").
    pub variable: &'static str,
    /// GRIB level description (e.g. "2 m above ground").
    pub level: &'static str,
    /// Variable name after GRIB-to-NetCDF conversion.
    pub netcdf_name: &'static str,
    /// Output slot this field is written to.
    pub target: ForcingVariable,
}

/// Immutable per-product metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSpec {
    pub key: ProductKey,
    pub name: &'static str,
    pub encoding: Encoding,
    pub kind: ProductKind,
    /// Spacing between successive issuance cycles.
    pub cycle_frequency_minutes: i64,
    /// Spacing between successive frames of one cycle.
    pub frame_interval_minutes: i64,
    /// Default file naming, relative to the product's input directory.
    pub file_template: &'static str,
    /// Source fields, or `None` when the decoder resolves variables itself.
    pub fields: Option<&'static [SourceField]>,
}

impl ProductSpec {
    pub fn is_forecast(&self) -> bool {
        self.kind == ProductKind::Forecast
    }

    pub fn cycle_frequency(&self) -> Duration {
        Duration::minutes(self.cycle_frequency_minutes)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::minutes(self.frame_interval_minutes)
    }

    pub fn source_variable_names(&self) -> Option<Vec<&'static str>> {
        self.fields
            .map(|fields| fields.iter().map(|f| f.variable).collect())
    }

    pub fn source_level_names(&self) -> Option<Vec<&'static str>> {
        self.fields.map(|fields| fields.iter().map(|f| f.level).collect())
    }

    pub fn source_field_names(&self) -> Option<Vec<&'static str>> {
        self.fields
            .map(|fields| fields.iter().map(|f| f.netcdf_name).collect())
    }

    /// For each source variable, its position in the output vector.
    pub fn output_index_map(&self) -> Option<Vec<usize>> {
        self.fields
            .map(|fields| fields.iter().map(|f| f.target.index()).collect())
    }
}

/// Look up a product by its configuration key.
pub fn define_product(code: u8) -> Result<&'static ProductSpec> {
    ProductKey::try_from(code).map(ProductKey::spec)
}

const fn field(
    variable: &'static str,
    level: &'static str,
    netcdf_name: &'static str,
    target: ForcingVariable,
) -> SourceField {
    SourceField {
        variable,
        level,
        netcdf_name,
        target,
    }
}

static SURFACE_FORECAST_FIELDS: [SourceField; NUM_FORCING_VARIABLES] = [
    field("TMP", "2 m above ground", "TMP_2maboveground", ForcingVariable::T2d),
    field("SPFH", "2 m above ground", "SPFH_2maboveground", ForcingVariable::Q2d),
    field("UGRD", "10 m above ground", "UGRD_10maboveground", ForcingVariable::U10),
    field("VGRD", "10 m above ground", "VGRD_10maboveground", ForcingVariable::V10),
    field("PRATE", "surface", "PRATE_surface", ForcingVariable::Prate),
    field("DSWRF", "surface", "DSWRF_surface", ForcingVariable::Swdown),
    field("DLWRF", "surface", "DLWRF_surface", ForcingVariable::Lwdown),
    field("PRES", "surface", "PRES_surface", ForcingVariable::Psfc),
];

static NLDAS2: ProductSpec = ProductSpec {
    key: ProductKey::Nldas2,
    name: "NLDAS2_GRIB1",
    encoding: Encoding::Grib1,
    kind: ProductKind::Analysis,
    cycle_frequency_minutes: 60,
    frame_interval_minutes: 60,
    file_template: "{valid_date}/NLDAS_FORA0125_H.A{valid_date}.{valid_hour}00.002.grb",
    fields: None,
};

static NARR: ProductSpec = ProductSpec {
    key: ProductKey::Narr,
    name: "NARR_GRIB1",
    encoding: Encoding::Grib1,
    kind: ProductKind::Analysis,
    cycle_frequency_minutes: 180,
    frame_interval_minutes: 180,
    file_template: "{valid_month}/narr-a_221_{valid_date}_{valid_hour}00_000.grb",
    fields: None,
};

static GFS: ProductSpec = ProductSpec {
    key: ProductKey::Gfs,
    name: "GFS_Production_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 360,
    frame_interval_minutes: 180,
    file_template: "gfs.{cycle_date}/{cycle_hour}/gfs.t{cycle_hour}z.pgrb2.0p50.f{fhr3}",
    fields: Some(&SURFACE_FORECAST_FIELDS),
};

static NAM_NEST: ProductSpec = ProductSpec {
    key: ProductKey::NamNest,
    name: "NAM_Conus_Nest_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 360,
    frame_interval_minutes: 60,
    file_template: "nam.{cycle_date}/nam.t{cycle_hour}z.conusnest.hiresf{fhr2}.tm00.grib2",
    fields: None,
};

static HRRR: ProductSpec = ProductSpec {
    key: ProductKey::Hrrr,
    name: "HRRR_Conus_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 60,
    frame_interval_minutes: 60,
    file_template: "hrrr.{cycle_date}/conus/hrrr.t{cycle_hour}z.wrfsfcf{fhr2}.grib2",
    fields: Some(&SURFACE_FORECAST_FIELDS),
};

static RAP: ProductSpec = ProductSpec {
    key: ProductKey::Rap,
    name: "RAP_Conus_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 60,
    frame_interval_minutes: 60,
    file_template: "rap.{cycle_date}/rap.t{cycle_hour}z.awp130pgrbf{fhr2}.grib2",
    fields: None,
};

static CFSV2: ProductSpec = ProductSpec {
    key: ProductKey::Cfsv2,
    name: "CFSv2_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 360,
    frame_interval_minutes: 360,
    file_template: "cfs.{cycle_date}/{cycle_hour}/6hrly_grib_01/flxf{valid_date}{valid_hour}.01.{cycle_date}{cycle_hour}.grb2",
    fields: None,
};

static WRF_ARW_HAWAII: ProductSpec = ProductSpec {
    key: ProductKey::WrfArwHawaii,
    name: "WRF_ARW_Hawaii_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 1440,
    frame_interval_minutes: 60,
    file_template: "hiresw.{cycle_date}/hiresw.t{cycle_hour}z.arw_2p5km.f{fhr2}.hi.grib2",
    fields: None,
};

static GFS_025: ProductSpec = ProductSpec {
    key: ProductKey::Gfs025,
    name: "GFS_Production_025d_GRIB2",
    encoding: Encoding::Grib2,
    kind: ProductKind::Forecast,
    cycle_frequency_minutes: 360,
    frame_interval_minutes: 60,
    file_template: "gfs.{cycle_date}/{cycle_hour}/gfs.t{cycle_hour}z.pgrb2.0p25.f{fhr3}",
    fields: Some(&SURFACE_FORECAST_FIELDS),
};

static CUSTOM_NETCDF: ProductSpec = ProductSpec {
    key: ProductKey::CustomNetcdf,
    name: "Custom_NetCDF",
    encoding: Encoding::Netcdf,
    kind: ProductKind::Analysis,
    cycle_frequency_minutes: 60,
    frame_interval_minutes: 60,
    file_template: "custom_{valid_date}{valid_hour}.nc",
    fields: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_rejected() {
        for code in [0u8, 11, 255] {
            match ProductKey::try_from(code) {
                Err(ForcingError::UnknownProductKey(c)) => assert_eq!(c, code),
                other => panic!("expected UnknownProductKey, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_key_roundtrip_and_spec_identity() {
        for key in ProductKey::ALL {
            assert_eq!(ProductKey::try_from(key.code()).unwrap(), key);
            assert_eq!(key.spec().key, key);
        }
    }

    #[test]
    fn test_hrrr_fields() {
        let spec = define_product(5).unwrap();
        assert_eq!(spec.name, "HRRR_Conus_GRIB2");
        assert_eq!(spec.encoding, Encoding::Grib2);
        assert_eq!(spec.cycle_frequency_minutes, 60);

        let vars = spec.source_variable_names().unwrap();
        assert_eq!(vars.len(), NUM_FORCING_VARIABLES);
        assert_eq!(vars[0], "TMP");

        let mut map = spec.output_index_map().unwrap();
        map.sort_unstable();
        assert_eq!(map, (0..NUM_FORCING_VARIABLES).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_lists_agree() {
        for key in ProductKey::ALL {
            let spec = key.spec();
            match spec.fields {
                Some(_) => {
                    let n = spec.source_variable_names().unwrap().len();
                    assert_eq!(spec.source_level_names().unwrap().len(), n);
                    assert_eq!(spec.source_field_names().unwrap().len(), n);
                    let map = spec.output_index_map().unwrap();
                    assert_eq!(map.len(), n);
                    assert!(map.iter().all(|&i| i < NUM_FORCING_VARIABLES));
                }
                None => {
                    assert!(spec.source_variable_names().is_none());
                    assert!(spec.output_index_map().is_none());
                }
            }
        }
    }

    #[test]
    fn test_netcdf_product_has_no_lists() {
        let spec = ProductKey::CustomNetcdf.spec();
        assert_eq!(spec.encoding, Encoding::Netcdf);
        assert!(spec.source_variable_names().is_none());
        assert!(spec.source_level_names().is_none());
        assert!(spec.source_field_names().is_none());
    }

    #[test]
    fn test_only_gridded_forecast_products_have_fields() {
        let with_fields: Vec<u8> = ProductKey::ALL
            .into_iter()
            .filter(|k| k.spec().fields.is_some())
            .map(ProductKey::code)
            .collect();
        assert_eq!(with_fields, vec![3, 5, 9]);
    }

    #[test]
    fn test_cycle_frequencies() {
        let freqs: Vec<i64> = ProductKey::ALL
            .iter()
            .map(|k| k.spec().cycle_frequency_minutes)
            .collect();
        assert_eq!(freqs, vec![60, 180, 360, 360, 60, 60, 360, 1440, 360, 60]);
    }

    #[test]
    fn test_serde_uses_numeric_key() {
        let key: ProductKey = serde_yaml::from_str("9").unwrap();
        assert_eq!(key, ProductKey::Gfs025);
        assert!(serde_yaml::from_str::<ProductKey>("12").is_err());
        assert_eq!(serde_yaml::to_string(&ProductKey::Hrrr).unwrap().trim(), "5");
    }
}
