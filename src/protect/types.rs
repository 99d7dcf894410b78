//! Camera model and the subset of the Protect bootstrap document we read.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;

/// A camera known to the Protect server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera {
    pub id: String,
    pub name: String,
    /// Earliest moment footage exists for, in local wall-clock time.
    pub recording_start: NaiveDateTime,
}

impl Camera {
    pub fn new(id: impl Into<String>, name: impl Into<String>, recording_start: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            recording_start,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bootstrap {
    #[serde(default)]
    pub cameras: Vec<BootstrapCamera>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BootstrapCamera {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub stats: Option<CameraStats>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CameraStats {
    pub video: Option<VideoStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoStats {
    /// Epoch milliseconds; zero or absent when the camera never recorded.
    pub recording_start: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessKeyResponse {
    pub access_key: String,
}

/// Convert epoch milliseconds to local wall-clock time.
pub(crate) fn local_from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|t| t.with_timezone(&Local).naive_local())
}

/// Convert local wall-clock time to epoch milliseconds.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times that do
/// not exist locally (DST gap) are read as UTC.
pub(crate) fn millis_from_local(t: NaiveDateTime) -> i64 {
    match t.and_local_timezone(Local).earliest() {
        Some(local) => local.timestamp_millis(),
        None => t.and_utc().timestamp_millis(),
    }
}

impl Bootstrap {
    /// Cameras that have footage. Cameras that never recorded are logged
    /// and left out.
    pub(crate) fn into_cameras(self) -> Vec<Camera> {
        self.cameras
            .into_iter()
            .filter_map(|c| {
                let name = c.name.unwrap_or_else(|| c.id.clone());
                let start_ms = c
                    .stats
                    .and_then(|s| s.video)
                    .and_then(|v| v.recording_start)
                    .filter(|ms| *ms > 0);
                match start_ms.and_then(local_from_millis) {
                    Some(recording_start) => Some(Camera::new(c.id, name, recording_start)),
                    None => {
                        tracing::warn!(camera = %c.id, name = %name, "Camera has no recordings, skipping");
                        None
                    }
                }
            })
            .collect()
    }
}
