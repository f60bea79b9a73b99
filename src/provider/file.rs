//! File-backed snapshot source

use crate::core::{Error, Result};
use crate::provider::SnapshotProvider;
use std::fs;
use std::path::PathBuf;

/// Reads the whole snapshot file on every poll
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

impl SnapshotProvider for FileSource {
    fn read_raw(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .map_err(|e| Error::ProviderUnreadable(format!("{}: {}", self.path.display(), e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
