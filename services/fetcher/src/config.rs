//! Fetch source and schedule configuration, loaded from YAML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use forcing_engine::config::expand_env_vars;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub source: SourceConfig,
    /// Local root; each cycle date gets its own directory below it.
    pub output_dir: PathBuf,
    /// Holds the PID of the running fetch.
    pub lock_file: PathBuf,
    pub schedule: ScheduleConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    600
}

/// Remote location and naming of the files.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    /// Per-cycle-date directory, e.g. `hiresw.{date}`.
    pub directory_template: String,
    /// File name, e.g. `hiresw.t{cycle:02}z.arw_2p5km.f{forecast:02}.pr.grib2`.
    pub file_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Cycle hours (UTC) that are published, e.g. `[6, 18]`.
    pub cycles: Vec<u32>,
    pub forecast_hours: ForecastHoursConfig,
    /// Download cycles issued within this many hours.
    pub lookback_hours: u32,
    /// Remove cycles issued between `lookback_hours` and this many hours ago.
    pub clean_back_hours: u32,
    /// Ignore cycles issued within this many hours; they are still being produced.
    pub lag_hours: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastHoursConfig {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl ForecastHoursConfig {
    /// Generate the list of forecast hours.
    pub fn hours(&self) -> Vec<u32> {
        (self.start..=self.end).step_by(self.step.max(1) as usize).collect()
    }
}

impl FetchConfig {
    /// Load a fetch configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(source = %config.source.name, path = %path.display(), "Loaded fetch config");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: FetchConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let schedule = &self.schedule;
        anyhow::ensure!(!schedule.cycles.is_empty(), "At least one cycle hour is required");
        anyhow::ensure!(
            schedule.cycles.iter().all(|&c| c < 24),
            "Cycle hours must be between 0 and 23"
        );
        anyhow::ensure!(
            schedule.lag_hours < schedule.lookback_hours,
            "lag_hours ({}) must be less than lookback_hours ({})",
            schedule.lag_hours,
            schedule.lookback_hours
        );
        anyhow::ensure!(
            schedule.lookback_hours <= schedule.clean_back_hours,
            "lookback_hours ({}) cannot exceed clean_back_hours ({})",
            schedule.lookback_hours,
            schedule.clean_back_hours
        );
        anyhow::ensure!(schedule.forecast_hours.step > 0, "Forecast hour step must be positive");
        anyhow::ensure!(!self.source.base_url.is_empty(), "Source base_url cannot be empty");
        Ok(())
    }

    /// Directory name for a cycle, relative to both the remote base URL and
    /// the local output directory.
    pub fn cycle_directory(&self, cycle: DateTime<Utc>) -> String {
        self.source
            .directory_template
            .replace("{date}", &cycle.format("%Y%m%d").to_string())
            .replace("{cycle:02}", &cycle.format("%H").to_string())
    }

    pub fn file_name(&self, cycle: DateTime<Utc>, forecast_hour: u32) -> String {
        self.source
            .file_pattern
            .replace("{date}", &cycle.format("%Y%m%d").to_string())
            .replace("{cycle:02}", &cycle.format("%H").to_string())
            .replace("{forecast:03}", &format!("{:03}", forecast_hour))
            .replace("{forecast:02}", &format!("{:02}", forecast_hour))
    }

    pub fn remote_url(&self, cycle: DateTime<Utc>, forecast_hour: u32) -> String {
        format!(
            "{}/{}/{}",
            self.source.base_url.trim_end_matches('/'),
            self.cycle_directory(cycle),
            self.file_name(cycle, forecast_hour)
        )
    }

    pub fn local_path(&self, cycle: DateTime<Utc>, forecast_hour: u32) -> PathBuf {
        self.output_dir
            .join(self.cycle_directory(cycle))
            .join(self.file_name(cycle, forecast_hour))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) const ARW_YAML: &str = r#"
source:
  name: wrf_arw_puerto_rico
  base_url: https://ftp.ncep.noaa.gov/data/nccf/com/hiresw/prod/
  directory_template: "hiresw.{date}"
  file_pattern: "hiresw.t{cycle:02}z.arw_2p5km.f{forecast:02}.pr.grib2"
output_dir: /data/arw
lock_file: /tmp/GET_ARW_PR.lock
schedule:
  cycles: [6, 18]
  forecast_hours:
    start: 1
    end: 48
    step: 1
  lookback_hours: 72
  clean_back_hours: 240
  lag_hours: 6
"#;

    #[test]
    fn test_forecast_hours() {
        let fh = ForecastHoursConfig {
            start: 1,
            end: 12,
            step: 3,
        };
        assert_eq!(fh.hours(), vec![1, 4, 7, 10]);
    }

    #[test]
    fn test_parse_arw_config() {
        let config = FetchConfig::from_yaml_str(ARW_YAML).unwrap();
        assert_eq!(config.source.name, "wrf_arw_puerto_rico");
        assert_eq!(config.schedule.cycles, vec![6, 18]);
        assert_eq!(config.schedule.forecast_hours.hours().len(), 48);
        assert_eq!(config.request_timeout_secs, 600);
    }

    #[test]
    fn test_paths() {
        let config = FetchConfig::from_yaml_str(ARW_YAML).unwrap();
        let cycle = Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap();

        assert_eq!(
            config.remote_url(cycle, 7),
            "https://ftp.ncep.noaa.gov/data/nccf/com/hiresw/prod/hiresw.20240302/hiresw.t06z.arw_2p5km.f07.pr.grib2"
        );
        assert_eq!(
            config.local_path(cycle, 48),
            PathBuf::from("/data/arw/hiresw.20240302/hiresw.t06z.arw_2p5km.f48.pr.grib2")
        );
    }

    #[test]
    fn test_invalid_window_rejected() {
        let yaml = ARW_YAML.replace("lag_hours: 6", "lag_hours: 80");
        assert!(FetchConfig::from_yaml_str(&yaml).is_err());

        let yaml = ARW_YAML.replace("cycles: [6, 18]", "cycles: [6, 24]");
        assert!(FetchConfig::from_yaml_str(&yaml).is_err());
    }
}
