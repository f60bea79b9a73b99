//! Core module - Configuration, errors, and common types

mod config;
mod error;
mod types;

pub use config::{Config, DisplayConfig, GeneralConfig, SourceConfig};
pub use error::{Error, Result};
pub use types::{
    display_label, to_kwh, ChartDataset, ChartView, DashboardView, DisplayRow, Entry, FailureReason,
    FieldValue, PollStatus, Snapshot, SnapshotFailure, MICROJOULES_TO_KWH,
};
