//! Snapshot providers
//!
//! A provider hands back the raw text of one snapshot on demand:
//! - `FileSource`: reads a text file published by the energy collector
//! - `ScriptedSource`: replays canned outcomes (demo and tests)

mod file;
mod scripted;

pub use file::FileSource;
pub use scripted::{ScriptStep, ScriptedSource};

use crate::core::{Result, Snapshot, SnapshotFailure};
use crate::parser;

/// Trait for snapshot sources
pub trait SnapshotProvider: Send + Sync {
    /// Read the current raw text
    fn read_raw(&self) -> Result<String>;

    /// Name of this source, for logs
    fn name(&self) -> &str;
}

/// Read and parse one snapshot, stamping it with `timestamp`
pub fn fetch_snapshot(
    provider: &dyn SnapshotProvider,
    timestamp: i64,
) -> std::result::Result<Snapshot, SnapshotFailure> {
    let raw = provider.read_raw().map_err(SnapshotFailure::from)?;
    parser::parse_snapshot(&raw, timestamp).map_err(SnapshotFailure::from)
}
