use std::fmt;

use crate::footage::{FetchError, FetchSummary};
use crate::interval::Interval;

use super::range::SyncRange;

/// Result of processing one (camera, interval) unit.
#[derive(Debug)]
pub enum UnitOutcome {
    /// Footage fetched and the high-water mark persisted.
    Fetched(FetchSummary),
    /// The interval ends at or before the camera's high-water mark.
    Skipped,
    /// The fetcher failed; state was left untouched.
    FetchFailed(FetchError),
}

/// A unit that stays pending for the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub camera_id: String,
    pub camera_name: String,
    pub interval: Interval,
    pub reason: String,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}: {}",
            self.camera_name, self.camera_id, self.interval, self.reason
        )
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub range: SyncRange,
    pub fetched: usize,
    pub skipped: usize,
    pub failures: Vec<UnitFailure>,
}

impl SyncReport {
    pub(crate) fn new(range: SyncRange) -> Self {
        Self {
            range,
            fetched: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
