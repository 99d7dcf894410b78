//! Persistent sync state.
//!
//! The statefile maps each camera id to the high-water mark up to which its
//! footage has been fetched. It is rewritten after every successful
//! (camera, interval) download, so an interrupted run resumes where it left
//! off and loses at most the download that was in flight.

pub mod error;
pub mod store;
pub mod types;

pub use error::StateError;
pub use store::{JsonStateStore, StateStore};
pub use types::{CameraState, SyncState};
