//! Effective time range of a sync run.

use std::fmt;

use chrono::NaiveDateTime;

use crate::interval::truncate_to_hour;
use crate::protect::Camera;
use crate::state::SyncState;

/// Half-open `[start, end)` covered by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SyncRange {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for SyncRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Work out which range to synchronize. All bounds are hour-truncated.
///
/// Explicit bounds win. Without an explicit end the range closes at `now`.
/// Without an explicit start it opens at the earliest point any selected
/// camera still needs: its stored high-water mark, or its recording start
/// when the state has no entry for it. Pass an empty state to ignore
/// recorded progress.
pub fn resolve_range(
    cameras: &[Camera],
    state: &SyncState,
    explicit_start: Option<NaiveDateTime>,
    explicit_end: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> SyncRange {
    let end = truncate_to_hour(explicit_end.unwrap_or(now));

    let start = match explicit_start {
        Some(start) => truncate_to_hour(start),
        None => cameras
            .iter()
            .map(|camera| match state.get(&camera.id) {
                Some(recorded) => truncate_to_hour(recorded.last),
                None => truncate_to_hour(camera.recording_start),
            })
            .min()
            .unwrap_or(end),
    };

    SyncRange { start, end }
}
