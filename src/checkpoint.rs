//! Position snapshot persistence for crash-safe resume.
//!
//! This module provides on-disk persistence of [`PositionData`] so that a
//! crashed or restarted producer can resume publishing from the last
//! committed position.
//!
//! # Example
//!
//! ```rust,no_run
//! use event_publish::checkpoint::PositionStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PositionStore::new("position.json");
//!
//!     // Load the last committed snapshot, if any
//!     if let Some(position) = store.load().await? {
//!         println!("Resuming with {} tracked topics", position.topics.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::position::{PositionCallback, PositionData};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Persists position snapshots to disk.
///
/// Writes are atomic: the snapshot goes to a temporary file, is synced, and
/// is then renamed into place, so the stored file is never partially
/// written even if the process crashes mid-save.
///
/// The store implements [`PositionCallback`], so it can be handed directly
/// to the producer as the position-update callback.
pub struct PositionStore {
    file_path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads the stored snapshot if one exists.
    ///
    /// Returns `None` when the file doesn't exist, which typically means
    /// this is the first run or the position was deliberately reset.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file exists but cannot be read, or contains
    /// JSON that doesn't match the [`PositionData`] structure.
    pub async fn load(&self) -> Result<Option<PositionData>> {
        if !self.file_path.exists() {
            debug!("No position file found at {:?}", self.file_path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path).await?;
        match serde_json::from_str::<PositionData>(&content) {
            Ok(position) => {
                info!(
                    topics = position.topics.len(),
                    captured_at = %position.captured_at,
                    "Loaded position snapshot"
                );
                Ok(Some(position))
            }
            Err(e) => {
                error!("Failed to parse position file: {}", e);
                Err(e.into())
            }
        }
    }

    /// Saves a snapshot to disk atomically.
    pub async fn save(&self, position: &PositionData) -> Result<()> {
        debug!(topics = position.topics.len(), "Saving position snapshot");

        let temp_path = self.file_path.with_extension("tmp");

        let json = serde_json::to_string_pretty(position)?;
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.file_path).await?;

        debug!("Position snapshot saved");
        Ok(())
    }

    /// Deletes the stored snapshot if it exists.
    ///
    /// Useful for resetting a producer to start from a clean position.
    pub async fn delete(&self) -> Result<()> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).await?;
            info!("Deleted position file");
        }
        Ok(())
    }
}

#[async_trait]
impl PositionCallback for PositionStore {
    async fn on_position_update(&mut self, position: PositionData) -> Result<()> {
        self.save(&position).await
    }
}
