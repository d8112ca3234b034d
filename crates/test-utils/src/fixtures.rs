//! Common test fixtures for forcing tests.

/// Reference times used across the test suite.
pub mod times {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// 2024-01-15T00:00:00Z, a 00Z cycle for every supported product.
    pub fn reference_cycle() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    /// `reference_cycle() + hours + minutes`.
    pub fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
        reference_cycle() + Duration::hours(hours) + Duration::minutes(minutes)
    }
}

/// Small model grids.
pub mod grid {
    /// `(nx, ny)` of a grid small enough to check cell by cell.
    pub const TINY: (usize, usize) = (4, 3);
}

/// Configuration snippets.
pub mod config {
    /// A forcing configuration for a single product with weighted-average
    /// interpolation on a 4x3 grid. `{key}` and `{dir}` are left for the
    /// caller to substitute.
    pub const SINGLE_PRODUCT_YAML: &str = r#"
input_forcings: [{key}]
input_dirs: ["{dir}"]
forecast_horizons: [1080]
cycle_offsets: [0]
temporal_interpolation: [2]
output_frequency_minutes: 60
grid:
  nx_global: 4
  ny_global: 3
"#;

    /// Render [`SINGLE_PRODUCT_YAML`] for `key` reading from `dir`.
    pub fn single_product(key: u8, dir: &std::path::Path) -> String {
        SINGLE_PRODUCT_YAML
            .replace("{key}", &key.to_string())
            .replace("{dir}", &dir.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_reference_times() {
        assert_eq!(times::reference_cycle().hour(), 0);
        assert_eq!(times::at(1, 30).minute(), 30);
        assert_eq!(times::at(25, 0).hour(), 1);
    }

    #[test]
    fn test_single_product_yaml() {
        let yaml = config::single_product(5, std::path::Path::new("/data/hrrr"));
        assert!(yaml.contains("input_forcings: [5]"));
        assert!(yaml.contains("\"/data/hrrr\""));
    }
}
