//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Source units are microjoules; 1 kWh = 3.6e12 uJ
pub const MICROJOULES_TO_KWH: f64 = 2.7777777777778e-13;

/// A single value parsed from a `key=value` token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value, if it was parsed as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// One process's reading at one sample time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Process id, unique within a snapshot
    pub pid: u32,
    /// Short process name (not unique, may change if the pid is reused)
    pub comm: String,
    /// Energy in microjoules; `None` when the source value is not a finite number
    pub energy_raw: Option<f64>,
    /// Energy in kilowatt-hours
    pub energy_converted: Option<f64>,
    /// Every key/value pair found on the line, keys lowercased
    pub fields: BTreeMap<String, FieldValue>,
    /// Original source line
    pub raw_line: String,
}

impl Entry {
    /// Build an entry from a reading in microjoules
    pub fn new(pid: u32, comm: &str, energy_uj: f64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("pid".to_string(), FieldValue::Number(pid as f64));
        fields.insert("comm".to_string(), FieldValue::Text(comm.to_string()));
        fields.insert("energy".to_string(), FieldValue::Number(energy_uj));

        Self {
            pid,
            comm: comm.to_string(),
            energy_raw: Some(energy_uj).filter(|v| v.is_finite()),
            energy_converted: to_kwh(energy_uj),
            fields,
            raw_line: format!("pid={} comm={} energy={}", pid, comm, energy_uj),
        }
    }
}

/// Convert microjoules to kWh, dropping non-finite results
pub fn to_kwh(energy_uj: f64) -> Option<f64> {
    let kwh = energy_uj * MICROJOULES_TO_KWH;
    kwh.is_finite().then_some(kwh)
}

/// `"<comm> (pid <pid>)"`
pub fn display_label(comm: &str, pid: u32) -> String {
    format!("{} (pid {})", comm, pid)
}

/// One timestamped batch of entries read from the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    pub entries: Vec<Entry>,
    pub raw_text: String,
}

/// A display-ready table row for the latest snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub pid: u32,
    pub comm: String,
    pub energy_kwh: Option<f64>,
    /// Energy with 3 decimals, or a placeholder when absent
    pub energy_display: String,
}

/// One chart line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub pid: u32,
    pub label: String,
    /// Aligned with `ChartView::labels`; `None` is a gap, never zero
    pub values: Vec<Option<f64>>,
}

/// Owned copy of the aligned window, ready for a chart consumer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

/// Why a poll cycle produced no snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    UnreadableSource,
    TransportFailure,
    NoEntries,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::UnreadableSource => "unreadable-source",
            FailureReason::TransportFailure => "transport-failure",
            FailureReason::NoEntries => "no-entries",
        }
    }
}

/// Structured failure handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFailure {
    pub reason: FailureReason,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl From<crate::core::Error> for SnapshotFailure {
    fn from(err: crate::core::Error) -> Self {
        use crate::core::Error;

        let message = err.to_string();
        match err {
            Error::NoEntries { raw_text } => Self {
                reason: FailureReason::NoEntries,
                message,
                raw_text: Some(raw_text),
            },
            Error::ProviderUnreadable(_) | Error::Io(_) => Self {
                reason: FailureReason::UnreadableSource,
                message,
                raw_text: None,
            },
            Error::TransportFailure(_) | Error::Config(_) | Error::Serialization(_) => Self {
                reason: FailureReason::TransportFailure,
                message,
                raw_text: None,
            },
        }
    }
}

impl fmt::Display for SnapshotFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason.as_str(), self.message)
    }
}

/// Status of the most recent poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PollStatus {
    /// No cycle has completed yet
    Waiting,
    /// Last cycle ingested a snapshot
    Ok { timestamp: i64, entries: usize },
    /// Last cycle failed; state was left untouched
    Failed { failure: SnapshotFailure },
    /// Polling was cancelled
    Stopped,
}

impl PollStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PollStatus::Ok { .. })
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStatus::Waiting => f.write_str("waiting for first sample"),
            PollStatus::Ok { timestamp, entries } => {
                write!(f, "ok: {} processes at {}", entries, timestamp)
            }
            PollStatus::Failed { failure } => write!(f, "error: {}", failure),
            PollStatus::Stopped => f.write_str("stopped"),
        }
    }
}

/// Everything a dashboard needs, copied out under one lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub status: PollStatus,
    pub chart: ChartView,
    pub rows: Vec<DisplayRow>,
    /// Raw text of the last successful or no-entries read
    pub last_raw_text: String,
    pub tick_count: u64,
    pub failed_polls: u64,
}
