//! Cleanup of old cycles and best-effort download of recent ones.
//!
//! Files are fetched one at a time. A file that fails (not published yet,
//! HTTP error, network error) is logged and skipped; the next run picks it
//! up again because nothing is written for it.

use std::collections::HashSet;
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Timelike, Utc};
use futures::{Stream, StreamExt};
use reqwest::Client;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::config::FetchConfig;

/// Cycle times issued between `newer_than` (exclusive) and `older_than`
/// (inclusive) hours before `now`, oldest first. Only the configured cycle
/// hours are kept.
pub fn cycles_in_window(
    now: DateTime<Utc>,
    older_than: u32,
    newer_than: u32,
    cycle_hours: &[u32],
) -> Vec<DateTime<Utc>> {
    let now = now
        .duration_trunc(ChronoDuration::hours(1))
        .unwrap_or(now);

    (newer_than + 1..=older_than)
        .rev()
        .map(|hours| now - ChronoDuration::hours(i64::from(hours)))
        .filter(|t| cycle_hours.contains(&t.hour()))
        .collect()
}

/// Counts from one download pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Remove cycle directories older than the lookback window.
    /// Returns the number of directories removed.
    ///
    /// A directory can hold several cycles (one per date, say). It is kept
    /// while any cycle inside the lookback window still maps to it.
    pub async fn clean(&self, now: DateTime<Utc>) -> Result<usize> {
        let schedule = &self.config.schedule;
        let mut in_use: HashSet<String> =
            cycles_in_window(now, schedule.lookback_hours, 0, &schedule.cycles)
                .into_iter()
                .map(|cycle| self.config.cycle_directory(cycle))
                .collect();
        in_use.insert(self.config.cycle_directory(now));

        let mut removed = 0;
        for cycle in cycles_in_window(
            now,
            schedule.clean_back_hours,
            schedule.lookback_hours,
            &schedule.cycles,
        ) {
            let name = self.config.cycle_directory(cycle);
            if in_use.contains(&name) {
                debug!(directory = %name, "Keeping directory shared with a recent cycle");
                continue;
            }
            let dir = self.config.output_dir.join(name);
            if fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                info!(path = %dir.display(), "Removing old data");
                fs::remove_dir_all(&dir)
                    .await
                    .with_context(|| format!("Failed to remove {}", dir.display()))?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Download every missing file of every cycle in the download window.
    pub async fn download_window(&self, now: DateTime<Utc>) -> Result<FetchReport> {
        let schedule = &self.config.schedule;
        let mut report = FetchReport::default();

        for cycle in cycles_in_window(
            now,
            schedule.lookback_hours,
            schedule.lag_hours,
            &schedule.cycles,
        ) {
            let dir = self.config.output_dir.join(self.config.cycle_directory(cycle));
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            for forecast_hour in schedule.forecast_hours.hours() {
                let path = self.config.local_path(cycle, forecast_hour);
                if fs::metadata(&path).await.is_ok() {
                    report.already_present += 1;
                    continue;
                }

                let url = self.config.remote_url(cycle, forecast_hour);
                match self.download(&url, &path).await {
                    Ok(bytes) => {
                        info!(url = %url, bytes = bytes, "Downloaded file");
                        report.downloaded += 1;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Unable to retrieve file, data may not be available yet");
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Stream `url` into `path` via a `.partial` file so an interrupted
    /// transfer never leaves a truncated file under the final name.
    #[instrument(skip(self, path), fields(url = %url))]
    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {}", status));
        }

        let partial = path.with_extension("partial");
        let written = save_partial(&partial, response.bytes_stream()).await?;

        fs::rename(&partial, path)
            .await
            .with_context(|| format!("Failed to move download to {}", path.display()))?;
        debug!(path = %path.display(), bytes = written, "Download complete");
        Ok(written)
    }
}

/// Write `stream` into `partial`. On any failure the partial file is
/// removed before the error is returned.
async fn save_partial<S, B, E>(partial: &Path, stream: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut file = fs::File::create(partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    match copy_stream(stream, &mut file).await {
        Ok(written) => Ok(written),
        Err(e) => {
            drop(file);
            fs::remove_file(partial).await.ok();
            Err(e)
        }
    }
}

/// Copy every chunk of `stream` into `writer` and flush it.
async fn copy_stream<S, B, E, W>(stream: S, writer: &mut W) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!("Stream error: {}", e))?;
        let chunk = chunk.as_ref();
        writer.write_all(chunk).await.context("Write failed")?;
        written += chunk.len() as u64;
    }
    writer.flush().await.context("Flush failed")?;
    Ok(written)
}
