//! State store trait and JSON file implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::StateError;
use super::types::SyncState;

/// Durable storage for [`SyncState`] snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state.
    ///
    /// A missing store yields an empty state; an unreadable one is an error.
    async fn load(&self) -> Result<SyncState, StateError>;

    /// Replace the persisted state with `state`.
    async fn save(&self, state: &SyncState) -> Result<(), StateError>;
}

/// Statefile holding the whole snapshot as one JSON document.
///
/// Writes go to `<path>.tmp` first, are flushed to disk, then renamed over
/// the statefile, so readers never observe a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Statefile location: `statefile` as-is when absolute, otherwise
    /// relative to the destination directory.
    pub fn in_destination(destination: &Path, statefile: &Path) -> Self {
        Self::new(destination.join(statefile))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> StateError {
        StateError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state file, starting from scratch");
                return Ok(SyncState::default());
            }
            Err(e) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let state: SyncState =
            serde_json::from_str(&contents).map_err(|e| StateError::Corrupt {
                path: self.path.clone(),
                source: e,
            })?;
        tracing::debug!(
            path = %self.path.display(),
            cameras = state.cameras.len(),
            "Loaded sync state"
        );
        Ok(state)
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        let json = serde_json::to_vec(state)?;
        let tmp_path = self.tmp_path();

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| self.write_error(e))?;
        file.write_all(&json).await.map_err(|e| self.write_error(e))?;
        file.sync_all().await.map_err(|e| self.write_error(e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        Ok(())
    }
}

/// In-memory store for orchestrator tests. Counts saves and can be told to
/// fail them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: std::sync::Mutex<SyncState>,
    saves: std::sync::atomic::AtomicUsize,
    fail_saves: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: std::sync::Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> SyncState {
        self.state.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn fail_saves(&self) {
        self.fail_saves
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StateError::Write {
                path: PathBuf::from(":memory:"),
                source: std::io::Error::other("save disabled"),
            });
        }
        *self.state.lock().unwrap() = state.clone();
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    async fn load(&self) -> Result<SyncState, StateError> {
        (**self).load().await
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        (**self).save(state).await
    }
}
