//! Saves on disk as pretty JSON.

use std::io;
use std::path::{Path, PathBuf};

use td_core::persistence::{SaveData, SaveStore};
use thiserror::Error;

/// Error type for file store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read or write the save file.
    #[error("Save file I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The save file is not a save.
    #[error("Save file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A save kept in one JSON file.
///
/// Writes go to a sibling temporary file first and are then renamed over
/// the save, so a crash mid-write leaves the previous save intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store saves at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the save file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SaveStore for FileStore {
    type Error = StoreError;

    fn load(&self) -> Result<Option<SaveData>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(SaveData::from_json(&text)?))
    }

    fn save(&mut self, data: &SaveData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp = self.temp_path();
        std::fs::write(&temp, data.to_json()?)?;
        std::fs::rename(&temp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "Save written");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
