//! Scripted snapshot source
//!
//! Replays a fixed list of outcomes, wrapping around at the end.

use crate::core::{Error, Result};
use crate::provider::SnapshotProvider;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One canned read outcome
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this raw text
    Text(String),
    /// Fail as if the source could not be read
    Unreadable(String),
    /// Block for a while, then return the text
    Slow(Duration, String),
}

impl ScriptStep {
    pub fn text(raw: &str) -> Self {
        ScriptStep::Text(raw.to_string())
    }

    pub fn unreadable(reason: &str) -> Self {
        ScriptStep::Unreadable(reason.to_string())
    }

    pub fn slow(delay: Duration, raw: &str) -> Self {
        ScriptStep::Slow(delay, raw.to_string())
    }
}

pub struct ScriptedSource {
    steps: Vec<ScriptStep>,
    cursor: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of reads performed so far
    pub fn reads(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl SnapshotProvider for ScriptedSource {
    fn read_raw(&self) -> Result<String> {
        if self.steps.is_empty() {
            return Err(Error::ProviderUnreadable("script is empty".to_string()));
        }

        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        match &self.steps[n % self.steps.len()] {
            ScriptStep::Text(raw) => Ok(raw.clone()),
            ScriptStep::Unreadable(reason) => Err(Error::ProviderUnreadable(reason.clone())),
            ScriptStep::Slow(delay, raw) => {
                std::thread::sleep(*delay);
                Ok(raw.clone())
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
