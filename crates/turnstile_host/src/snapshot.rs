//! Named save states.

use crate::error::{HostError, HostErrorKind};
use crate::history::{HistoryEntry, InitialStateRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{GameSettings, Player, RandomSeed};

/// Everything needed to rebuild a session.
///
/// Stored states in `history` are informational only. Loading always
/// re-derives them by replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    /// Session seed.
    pub random_seed: RandomSeed,
    /// Settings at start.
    pub settings: GameSettings,
    /// Players at start.
    pub players: Vec<Player>,
    /// Recorded moves.
    pub history: Vec<HistoryEntry>,
    /// Genesis record.
    pub initial_state: InitialStateRecord,
}

/// Listing row for a stored save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct SaveStateEntry {
    /// Save name.
    pub name: String,
    /// Last write, epoch milliseconds.
    pub ctime: i64,
}

/// Persistence collaborator for save states.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Lists stored saves, newest first.
    async fn list(&self) -> Result<Vec<SaveStateEntry>, HostError>;

    /// Stores `state` under `name`, replacing any previous save.
    async fn save(&self, name: &str, state: &SaveState) -> Result<(), HostError>;

    /// Fetches the save named `name`.
    async fn load(&self, name: &str) -> Result<SaveState, HostError>;

    /// Removes the save named `name`.
    async fn delete(&self, name: &str) -> Result<(), HostError>;
}

/// One pretty-printed JSON file per save under a root directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

const EXTENSION: &str = "json";

impl FileSnapshotStore {
    /// Stores saves under `root`, created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory saves live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, HostError> {
        Ok(self.root.join(sanitize(name)?).with_extension(EXTENSION))
    }
}

/// Reduces `name` to a single safe path component.
fn sanitize(name: &str) -> Result<String, HostError> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        return Err(
            HostErrorKind::PersistenceFailure(format!("invalid save name '{}'", name)).into(),
        );
    }
    Ok(cleaned)
}

fn persistence(context: &str, err: std::io::Error) -> HostError {
    HostError::new(HostErrorKind::PersistenceFailure(format!(
        "{}: {}",
        context, err
    )))
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list(&self) -> Result<Vec<SaveStateEntry>, HostError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Save directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(persistence("failed to read save directory", e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| persistence("failed to read save directory", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(time) => time,
                Err(e) => {
                    warn!(name, error = %e, "Skipping save without modification time");
                    continue;
                }
            };
            entries.push(SaveStateEntry::new(
                name.to_string(),
                DateTime::<Utc>::from(modified).timestamp_millis(),
            ));
        }
        entries.sort_by(|a, b| b.ctime.cmp(&a.ctime).then_with(|| a.name.cmp(&b.name)));
        debug!(count = entries.len(), "Listed saves");
        Ok(entries)
    }

    #[instrument(skip(self, state), fields(moves = state.history.len()))]
    async fn save(&self, name: &str, state: &SaveState) -> Result<(), HostError> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| persistence("failed to create save directory", e))?;
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| HostErrorKind::PersistenceFailure(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| persistence("failed to write save", e))?;
        info!(path = %path.display(), "Saved game");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, name: &str) -> Result<SaveState, HostError> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(
                    HostErrorKind::PersistenceFailure(format!("no save named '{}'", name)).into(),
                );
            }
            Err(e) => return Err(persistence("failed to read save", e)),
        };
        let state: SaveState = serde_json::from_slice(&bytes).map_err(|e| {
            HostErrorKind::PersistenceFailure(format!("corrupt save '{}': {}", name, e))
        })?;
        info!(moves = state.history.len(), "Loaded game");
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), HostError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted save");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(HostErrorKind::PersistenceFailure(format!("no save named '{}'", name)).into())
            }
            Err(e) => Err(persistence("failed to delete save", e)),
        }
    }
}
