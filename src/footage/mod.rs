//! Footage fetcher: downloads the recordings of one camera for one interval.
//!
//! An interval is split into clock-hour segments, each exported from the
//! Protect server into its own file. Segments are streamed to a `.part`
//! file and renamed into place, so an interrupted download never leaves a
//! truncated file under the final name.

pub mod disk;
pub mod error;
pub mod file;
pub mod paths;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Response;

pub use error::FetchError;

use crate::interval::{Interval, Partitioner};
use crate::protect::{Camera, ProtectClient, ProtectError};
use crate::retry::RetryPolicy;
use file::SegmentWrite;

/// Downloads footage for a (camera, interval) unit.
///
/// Implementations must either store everything the unit needs or return
/// an error; the orchestrator only advances state on `Ok`.
#[async_trait]
pub trait FootageFetcher: Send + Sync {
    async fn fetch(&self, camera: &Camera, interval: &Interval)
        -> Result<FetchSummary, FetchError>;
}

#[async_trait]
impl<T: FootageFetcher + ?Sized> FootageFetcher for Arc<T> {
    async fn fetch(
        &self,
        camera: &Camera,
        interval: &Interval,
    ) -> Result<FetchSummary, FetchError> {
        (**self).fetch(camera, interval).await
    }
}

/// Server side of a fetch: starts exports and renews the session.
#[async_trait]
pub trait ExportSource: Send + Sync {
    async fn export(
        &self,
        camera: &Camera,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Response, reqwest::Error>;

    async fn relogin(&self) -> Result<(), ProtectError>;
}

#[async_trait]
impl ExportSource for ProtectClient {
    async fn export(
        &self,
        camera: &Camera,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Response, reqwest::Error> {
        ProtectClient::export(self, camera, start, end).await
    }

    async fn relogin(&self) -> Result<(), ProtectError> {
        ProtectClient::relogin(self).await
    }
}

/// File counts for one fetch, also used for per-run totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: u64,
    pub skipped: u64,
    pub empty: u64,
    pub failed: u64,
    pub bytes: u64,
}

impl FetchSummary {
    fn add(&mut self, other: &FetchSummary) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.empty += other.empty;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

/// Subset of application config consumed by the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub destination: PathBuf,
    pub use_utc_filenames: bool,
    pub skip_existing_files: bool,
    pub ignore_failed_downloads: bool,
    pub max_usage: u8,
    pub wait_between_downloads: Duration,
    pub retry: RetryPolicy,
}

/// Outcome of a single hour segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentOutcome {
    Downloaded { bytes: u64 },
    Existing,
    Empty,
}

/// [`FootageFetcher`] exporting footage from a Protect server.
pub struct ProtectFetcher<C = ProtectClient> {
    client: Arc<C>,
    config: FetchConfig,
    segmenter: Partitioner,
    totals: Mutex<FetchSummary>,
}

impl<C: ExportSource> ProtectFetcher<C> {
    pub fn new(client: Arc<C>, config: FetchConfig) -> Self {
        Self {
            client,
            config,
            segmenter: Partitioner::with_bucket_hours(1),
            totals: Mutex::new(FetchSummary::default()),
        }
    }

    /// Files downloaded, skipped and failed so far in this process.
    pub fn totals(&self) -> FetchSummary {
        self.totals.lock().map(|t| *t).unwrap_or_default()
    }

    fn record(&self, summary: &FetchSummary) {
        if let Ok(mut totals) = self.totals.lock() {
            totals.add(summary);
        }
    }

    async fn fetch_segment(
        &self,
        camera: &Camera,
        segment: &Interval,
    ) -> Result<SegmentOutcome, FetchError> {
        let path = paths::footage_path(
            &self.config.destination,
            &camera.name,
            segment.start,
            self.config.use_utc_filenames,
        );
        if self.config.skip_existing_files && path.exists() {
            tracing::debug!(path = %path.display(), "Segment already on disk, skipping");
            return Ok(SegmentOutcome::Existing);
        }

        disk::ensure_capacity(&self.config.destination, self.config.max_usage)?;

        let label = format!("{} {}", camera.name, segment);
        let write = match self.download_with_retry(camera, segment, &path, &label).await {
            Err(FetchError::Unauthorized(_)) => {
                self.client.relogin().await?;
                self.download_with_retry(camera, segment, &path, &label).await?
            }
            other => other?,
        };

        match write {
            SegmentWrite::Saved { bytes } => {
                tracing::info!(bytes, path = %path.display(), "Downloaded segment");
                if !self.config.wait_between_downloads.is_zero() {
                    tokio::time::sleep(self.config.wait_between_downloads).await;
                }
                Ok(SegmentOutcome::Downloaded { bytes })
            }
            SegmentWrite::Empty => {
                tracing::debug!(segment = %label, "No footage for segment");
                Ok(SegmentOutcome::Empty)
            }
        }
    }

    async fn download_with_retry(
        &self,
        camera: &Camera,
        segment: &Interval,
        path: &std::path::Path,
        label: &str,
    ) -> Result<SegmentWrite, FetchError> {
        let result = self
            .config
            .retry
            .run(label, move || async move {
                let response = self
                    .client
                    .export(camera, segment.start, segment.end)
                    .await
                    .map_err(|e| FetchError::Http {
                        source: e,
                        segment: label.to_string(),
                        bytes_written: 0,
                    })?;
                file::write_segment(response, path, label).await
            })
            .await;

        result.map_err(|(e, attempts)| {
            if attempts > 1 && e.is_retryable() {
                FetchError::RetriesExhausted {
                    retries: attempts - 1,
                    segment: label.to_string(),
                    last_error: e.to_string(),
                }
            } else {
                e
            }
        })
    }
}

/// Failures caused by the server or the network, which
/// `--ignore-failed-downloads` may skip. Local disk problems never are.
fn is_remote_failure(e: &FetchError) -> bool {
    matches!(
        e,
        FetchError::HttpStatus { .. } | FetchError::Http { .. } | FetchError::RetriesExhausted { .. }
    )
}

#[async_trait]
impl<C: ExportSource> FootageFetcher for ProtectFetcher<C> {
    async fn fetch(
        &self,
        camera: &Camera,
        interval: &Interval,
    ) -> Result<FetchSummary, FetchError> {
        let mut summary = FetchSummary::default();
        if interval.is_empty() {
            return Ok(summary);
        }
        tracing::debug!(
            camera = %camera.id,
            interval = %interval,
            hours = interval.duration().num_hours(),
            "Fetching footage"
        );

        for segment in self.segmenter.partition(interval.start, interval.end) {
            match self.fetch_segment(camera, &segment).await {
                Ok(SegmentOutcome::Downloaded { bytes }) => {
                    summary.downloaded += 1;
                    summary.bytes += bytes;
                }
                Ok(SegmentOutcome::Existing) => summary.skipped += 1,
                Ok(SegmentOutcome::Empty) => summary.empty += 1,
                Err(e) if self.config.ignore_failed_downloads && is_remote_failure(&e) => {
                    tracing::warn!(
                        camera = %camera.id,
                        segment = %segment,
                        "Ignoring failed download: {}",
                        e
                    );
                    summary.failed += 1;
                }
                Err(e) => {
                    self.record(&summary);
                    return Err(e);
                }
            }
        }

        self.record(&summary);
        Ok(summary)
    }
}
