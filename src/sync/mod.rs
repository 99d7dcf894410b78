//! Sync orchestrator: one resumable pass over every selected camera.
//!
//! The resolved range is split into buckets. Buckets are visited in
//! ascending order and, within a bucket, cameras in the order given. A unit
//! whose bucket ends at or before the camera's high-water mark is skipped;
//! otherwise it is fetched and, on success, the new mark is persisted before
//! the next unit starts. Fetch failures are logged and leave the unit
//! pending for the next run.

pub mod error;
pub mod outcome;
pub mod range;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};

pub use error::SyncError;
pub use outcome::{SyncReport, UnitFailure, UnitOutcome};
pub use range::{resolve_range, SyncRange};

use crate::footage::FootageFetcher;
use crate::interval::{Interval, Partitioner};
use crate::protect::Camera;
use crate::state::{StateStore, SyncState};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Start from an empty state; the first save overwrites the statefile.
    pub ignore_state: bool,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub partitioner: Partitioner,
    pub show_progress: bool,
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct SyncOrchestrator<S, F> {
    config: SyncConfig,
    store: S,
    fetcher: F,
    clock: Clock,
}

impl<S: StateStore, F: FootageFetcher> SyncOrchestrator<S, F> {
    pub fn new(config: SyncConfig, store: S, fetcher: F) -> Self {
        Self {
            config,
            store,
            fetcher,
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the wall clock used to close an open-ended range.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Synchronize `cameras` over the configured range.
    ///
    /// Only state errors abort the run: a statefile that cannot be read
    /// stops it before any fetch, one that cannot be written stops it right
    /// after the fetch whose progress could not be recorded.
    pub async fn run(&self, cameras: &[Camera]) -> Result<SyncReport, SyncError> {
        let mut state = if self.config.ignore_state {
            tracing::info!("Ignoring recorded sync state");
            SyncState::default()
        } else {
            self.store.load().await?
        };

        let range = resolve_range(
            cameras,
            &state,
            self.config.start,
            self.config.end,
            (self.clock)(),
        );
        let mut report = SyncReport::new(range);

        let intervals = self.config.partitioner.partition(range.start, range.end);
        if intervals.is_empty() || cameras.is_empty() {
            tracing::info!(range = %range, "Nothing to synchronize");
            return Ok(report);
        }
        tracing::info!(
            range = %range,
            buckets = intervals.len(),
            bucket_hours = self.config.partitioner.bucket().num_hours(),
            cameras = cameras.len(),
            "Starting sync"
        );

        let pb = create_progress_bar(
            !self.config.show_progress,
            (intervals.len() * cameras.len()) as u64,
        );

        for interval in &intervals {
            for camera in cameras {
                pb.set_message(camera.name.clone());
                let outcome = self.process_unit(&mut state, camera, interval).await;
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        pb.abandon();
                        return Err(e);
                    }
                };

                match outcome {
                    UnitOutcome::Fetched(summary) => {
                        pb.suspend(|| {
                            tracing::info!(
                                camera = %camera.id,
                                name = %camera.name,
                                interval = %interval,
                                files = summary.downloaded,
                                "Synchronized"
                            );
                        });
                        report.fetched += 1;
                    }
                    UnitOutcome::Skipped => {
                        tracing::debug!(camera = %camera.id, interval = %interval, "Already synchronized");
                        report.skipped += 1;
                    }
                    UnitOutcome::FetchFailed(e) => {
                        pb.suspend(|| {
                            tracing::error!(
                                camera = %camera.id,
                                name = %camera.name,
                                interval = %interval,
                                "Fetch failed: {}",
                                e
                            );
                        });
                        report.failures.push(UnitFailure {
                            camera_id: camera.id.clone(),
                            camera_name: camera.name.clone(),
                            interval: *interval,
                            reason: e.to_string(),
                        });
                    }
                }
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        Ok(report)
    }

    async fn process_unit(
        &self,
        state: &mut SyncState,
        camera: &Camera,
        interval: &Interval,
    ) -> Result<UnitOutcome, SyncError> {
        if interval.end <= state.last_or_epoch(&camera.id) {
            return Ok(UnitOutcome::Skipped);
        }

        match self.fetcher.fetch(camera, interval).await {
            Ok(summary) => {
                state.record(&camera.id, &camera.name, interval.end);
                self.store.save(state).await?;
                Ok(UnitOutcome::Fetched(summary))
            }
            Err(e) => Ok(UnitOutcome::FetchFailed(e)),
        }
    }
}

/// Resolve `path` to an existing, writable directory.
pub fn validate_destination(path: &Path) -> Result<PathBuf, SyncError> {
    let invalid = |reason: String| SyncError::InvalidDestination {
        path: path.to_path_buf(),
        reason,
    };

    let canonical = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    if metadata.permissions().readonly() {
        return Err(invalid("directory is read-only".to_string()));
    }
    Ok(canonical)
}

/// Progress bar over sync units, hidden when disabled or stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::footage::{FetchError, FetchSummary};
    use crate::state::store::MemoryStateStore;
    use crate::state::{JsonStateStore, StateError};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn cam(id: &str, recording_start: &str) -> Camera {
        Camera::new(id, format!("Camera {}", id), dt(recording_start))
    }

    fn config() -> SyncConfig {
        SyncConfig {
            ignore_state: false,
            start: None,
            end: None,
            partitioner: Partitioner::default(),
            show_progress: false,
        }
    }

    type FailWhen = Box<dyn Fn(&Camera, &Interval) -> bool + Send + Sync>;

    /// Records every call and fails the units matched by `fail_when`.
    struct ScriptedFetcher {
        calls: Mutex<Vec<(String, Interval)>>,
        fail_when: FailWhen,
    }

    impl ScriptedFetcher {
        fn ok() -> Self {
            Self::failing(|_, _| false)
        }

        fn failing(fail_when: impl Fn(&Camera, &Interval) -> bool + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_when: Box::new(fail_when),
            }
        }

        fn calls(&self) -> Vec<(String, Interval)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FootageFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            camera: &Camera,
            interval: &Interval,
        ) -> Result<FetchSummary, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((camera.id.clone(), *interval));
            if (self.fail_when)(camera, interval) {
                return Err(FetchError::HttpStatus {
                    status: 500,
                    segment: interval.to_string(),
                });
            }
            Ok(FetchSummary {
                downloaded: 1,
                ..FetchSummary::default()
            })
        }
    }

    fn orchestrator(
        config: SyncConfig,
        store: &Arc<MemoryStateStore>,
        fetcher: &Arc<ScriptedFetcher>,
        now: &str,
    ) -> SyncOrchestrator<Arc<MemoryStateStore>, Arc<ScriptedFetcher>> {
        let now = dt(now);
        SyncOrchestrator::new(config, Arc::clone(store), Arc::clone(fetcher)).with_clock(move || now)
    }

    #[tokio::test]
    async fn test_resume_after_interrupted_run() {
        let cameras = [cam("cam1", "2024-01-01T00:00:00")];
        let store = Arc::new(MemoryStateStore::default());

        // First run: only the first bucket succeeds.
        let first = Arc::new(ScriptedFetcher::failing(|_, interval| {
            interval.start >= dt("2024-01-02T00:00:00")
        }));
        let report = orchestrator(config(), &store, &first, "2024-01-03T05:17:00")
            .run(&cameras)
            .await
            .unwrap();
        assert_eq!(report.range.start, dt("2024-01-01T00:00:00"));
        assert_eq!(report.range.end, dt("2024-01-03T05:00:00"));
        assert_eq!(report.fetched, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(
            store.snapshot().get("cam1").unwrap().last,
            dt("2024-01-02T00:00:00")
        );

        // Second run picks up from the persisted mark.
        let second = Arc::new(ScriptedFetcher::ok());
        let report = orchestrator(config(), &store, &second, "2024-01-03T05:17:00")
            .run(&cameras)
            .await
            .unwrap();
        assert_eq!(report.range.start, dt("2024-01-02T00:00:00"));
        assert_eq!(
            second.calls(),
            vec![
                (
                    "cam1".to_string(),
                    Interval::new(dt("2024-01-02T00:00:00"), dt("2024-01-03T00:00:00"))
                ),
                (
                    "cam1".to_string(),
                    Interval::new(dt("2024-01-03T00:00:00"), dt("2024-01-03T05:00:00"))
                ),
            ]
        );
        let recorded = store.snapshot();
        let cam1 = recorded.get("cam1").unwrap();
        assert_eq!(cam1.last, dt("2024-01-03T05:00:00"));
        assert_eq!(cam1.name, "Camera cam1");
    }

    #[tokio::test]
    async fn test_second_run_fetches_nothing() {
        let cameras = [cam("cam1", "2024-01-01T00:00:00")];
        let store = Arc::new(MemoryStateStore::default());
        let fetcher = Arc::new(ScriptedFetcher::ok());

        orchestrator(config(), &store, &fetcher, "2024-01-03T05:17:00")
            .run(&cameras)
            .await
            .unwrap();
        let after_first = store.snapshot();
        let calls_after_first = fetcher.calls().len();

        let report = orchestrator(config(), &store, &fetcher, "2024-01-03T05:17:00")
            .run(&cameras)
            .await
            .unwrap();
        assert_eq!(report.fetched, 0);
        assert_eq!(fetcher.calls().len(), calls_after_first);
        assert_eq!(store.snapshot(), after_first);
    }

    #[tokio::test]
    async fn test_persists_after_every_success() {
        let cameras = [
            cam("a", "2024-01-01T00:00:00"),
            cam("b", "2024-01-01T00:00:00"),
        ];
        let store = Arc::new(MemoryStateStore::default());
        let fetcher = Arc::new(ScriptedFetcher::ok());

        let report = orchestrator(config(), &store, &fetcher, "2024-01-03T00:00:00")
            .run(&cameras)
            .await
            .unwrap();
        assert_eq!(report.fetched, 4);
        assert_eq!(store.save_count(), 4);

        // Bucket-major order, cameras in caller order within a bucket.
        let order: Vec<_> = fetcher
            .calls()
            .into_iter()
            .map(|(id, interval)| (id, interval.start))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), dt("2024-01-01T00:00:00")),
                ("b".to_string(), dt("2024-01-01T00:00:00")),
                ("a".to_string(), dt("2024-01-02T00:00:00")),
                ("b".to_string(), dt("2024-01-02T00:00:00")),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_camera_does_not_block_others() {
        let cameras = [
            cam("a", "2024-01-01T00:00:00"),
            cam("b", "2024-01-01T00:00:00"),
        ];
        let mut initial = SyncState::default();
        initial.record("b", "Camera b", dt("2023-12-31T00:00:00"));
        let store = Arc::new(MemoryStateStore::with_state(initial));
        let fetcher = Arc::new(ScriptedFetcher::failing(|camera, _| camera.id == "b"));

        let report = orchestrator(config(), &store, &fetcher, "2024-01-03T00:00:00")
            .run(&cameras)
            .await
            .unwrap();

        // b's older mark opens the range a day before a started recording.
        assert_eq!(report.range.start, dt("2023-12-31T00:00:00"));
        assert_eq!(report.fetched, 3);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f.camera_id == "b"));
        assert_eq!(report.failures[0].camera_name, "Camera b");
        assert!(!report.is_complete());

        let state = store.snapshot();
        assert_eq!(state.get("a").unwrap().last, dt("2024-01-03T00:00:00"));
        assert_eq!(state.get("b").unwrap().last, dt("2023-12-31T00:00:00"));
    }

    #[tokio::test]
    async fn test_units_behind_high_water_mark_are_skipped() {
        let cameras = [cam("a", "2024-01-01T00:00:00")];
        let mut initial = SyncState::default();
        initial.record("a", "Camera a", dt("2024-01-05T00:00:00"));
        let store = Arc::new(MemoryStateStore::with_state(initial.clone()));
        let fetcher = Arc::new(ScriptedFetcher::ok());

        let mut cfg = config();
        cfg.start = Some(dt("2024-01-01T00:00:00"));
        cfg.end = Some(dt("2024-01-03T00:00:00"));
        let report = orchestrator(cfg, &store, &fetcher, "2024-02-01T00:00:00")
            .run(&cameras)
            .await
            .unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.fetched, 0);
        assert!(fetcher.calls().is_empty());
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.snapshot(), initial);
    }

    #[tokio::test]
    async fn test_explicit_range_overrides_state() {
        let cameras = [cam("a", "2024-01-01T00:00:00")];
        let mut initial = SyncState::default();
        initial.record("a", "Camera a", dt("2024-01-02T00:00:00"));
        let store = Arc::new(MemoryStateStore::with_state(initial));
        let fetcher = Arc::new(ScriptedFetcher::ok());

        let mut cfg = config();
        cfg.start = Some(dt("2024-01-03T10:20:00"));
        cfg.end = Some(dt("2024-01-04T02:45:00"));
        let report = orchestrator(cfg, &store, &fetcher, "2024-02-01T00:00:00")
            .run(&cameras)
            .await
            .unwrap();

        assert_eq!(report.range.start, dt("2024-01-03T10:00:00"));
        assert_eq!(report.range.end, dt("2024-01-04T02:00:00"));
        let intervals: Vec<_> = fetcher.calls().into_iter().map(|(_, i)| i).collect();
        assert_eq!(
            intervals,
            vec![
                Interval::new(dt("2024-01-03T10:00:00"), dt("2024-01-04T00:00:00")),
                Interval::new(dt("2024-01-04T00:00:00"), dt("2024-01-04T02:00:00")),
            ]
        );
    }

    #[tokio::test]
    async fn test_ignore_state_refetches_and_overwrites() {
        let cameras = [cam("a", "2024-01-01T00:00:00")];
        let mut initial = SyncState::default();
        initial.record("a", "Camera a", dt("2024-01-03T00:00:00"));
        initial.record("old", "Old", dt("2024-01-03T00:00:00"));
        let store = Arc::new(MemoryStateStore::with_state(initial));
        let fetcher = Arc::new(ScriptedFetcher::ok());

        let mut cfg = config();
        cfg.ignore_state = true;
        let report = orchestrator(cfg, &store, &fetcher, "2024-01-03T00:00:00")
            .run(&cameras)
            .await
            .unwrap();

        assert_eq!(report.range.start, dt("2024-01-01T00:00:00"));
        assert_eq!(report.fetched, 2);
        let state = store.snapshot();
        assert!(state.get("old").is_none());
        assert_eq!(state.get("a").unwrap().last, dt("2024-01-03T00:00:00"));
    }

    #[tokio::test]
    async fn test_no_cameras_is_a_no_op() {
        let store = Arc::new(MemoryStateStore::default());
        let fetcher = Arc::new(ScriptedFetcher::ok());
        let report = orchestrator(config(), &store, &fetcher, "2024-01-03T05:17:00")
            .run(&[])
            .await
            .unwrap();
        assert!(report.range.is_empty());
        assert_eq!(report.fetched + report.skipped, 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_stops_the_run() {
        let cameras = [cam("a", "2024-01-01T00:00:00")];
        let store = Arc::new(MemoryStateStore::default());
        store.fail_saves();
        let fetcher = Arc::new(ScriptedFetcher::ok());

        let err = orchestrator(config(), &store, &fetcher, "2024-01-03T00:00:00")
            .run(&cameras)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::State(StateError::Write { .. })));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_statefile_aborts_before_fetching() {
        let dir = std::env::temp_dir()
            .join("protect_archiver_tests")
            .join("sync")
            .join("corrupt");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sync.state");
        std::fs::write(&path, "{not json").unwrap();

        let fetcher = Arc::new(ScriptedFetcher::ok());
        let orchestrator =
            SyncOrchestrator::new(config(), JsonStateStore::new(&path), Arc::clone(&fetcher))
                .with_clock(|| dt("2024-01-03T00:00:00"));
        let err = orchestrator
            .run(&[cam("a", "2024-01-01T00:00:00")])
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::State(ref e) if e.is_corrupt()));
        assert!(fetcher.calls().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_validate_destination() {
        let dir = std::env::temp_dir()
            .join("protect_archiver_tests")
            .join("sync")
            .join("destination");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        assert_eq!(
            validate_destination(&dir).unwrap(),
            std::fs::canonicalize(&dir).unwrap()
        );

        let missing = dir.join("missing");
        assert!(matches!(
            validate_destination(&missing),
            Err(SyncError::InvalidDestination { .. })
        ));

        let file = dir.join("file");
        std::fs::write(&file, "x").unwrap();
        let err = validate_destination(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
