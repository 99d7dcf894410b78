//! Types for the sync state file.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::interval::{epoch, truncate_to_hour};

/// Durable progress of a single camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    /// Inclusive high-water mark: footage up to here has been fetched.
    #[serde(with = "naive_timestamp")]
    pub last: NaiveDateTime,
    /// Display name of the camera when it was last synchronized.
    #[serde(default)]
    pub name: String,
}

/// Persisted sync progress, keyed by camera id.
///
/// Serializes as `{"cameras": {"<id>": {"last": "...", "name": "..."}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub cameras: BTreeMap<String, CameraState>,
}

impl SyncState {
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn get(&self, camera_id: &str) -> Option<&CameraState> {
        self.cameras.get(camera_id)
    }

    /// Hour-truncated high-water mark, or [`epoch`] for unknown cameras.
    pub fn last_or_epoch(&self, camera_id: &str) -> NaiveDateTime {
        self.cameras
            .get(camera_id)
            .map(|c| truncate_to_hour(c.last))
            .unwrap_or_else(epoch)
    }

    /// Record that `camera_id` is synchronized through `last`.
    pub fn record(&mut self, camera_id: &str, name: &str, last: NaiveDateTime) {
        self.cameras.insert(
            camera_id.to_string(),
            CameraState {
                last,
                name: name.to_string(),
            },
        );
    }
}

/// Statefile timestamps: written as `YYYY-MM-DDTHH:MM:SS`, read leniently.
///
/// Fractional seconds and a trailing UTC offset are accepted on read; the
/// offset is dropped and the wall-clock value kept.
mod naive_timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub(super) fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(FORMAT))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub(super) fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(t);
        }
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(t);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.naive_local())
    }
}
