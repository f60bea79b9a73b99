//! Table projection of the latest snapshot
//!
//! Pure function of a snapshot: rows sorted by energy, highest first.

use crate::core::{DisplayRow, Snapshot};
use std::cmp::Ordering;

/// Shown in place of a missing or non-finite energy value
pub const PLACEHOLDER: &str = "-";

/// Decimal places used for kWh values
pub const ENERGY_DECIMALS: usize = 3;

/// Project a snapshot into display rows.
///
/// Sorted by converted energy descending. The sort is stable, so equal
/// energies keep their parse order; absent values go last.
pub fn project(snapshot: &Snapshot) -> Vec<DisplayRow> {
    let mut rows: Vec<DisplayRow> = snapshot
        .entries
        .iter()
        .map(|entry| {
            let energy_kwh = entry.energy_converted.filter(|v| v.is_finite());
            DisplayRow {
                pid: entry.pid,
                comm: entry.comm.clone(),
                energy_kwh,
                energy_display: format_energy(energy_kwh),
            }
        })
        .collect();

    rows.sort_by(|a, b| compare_energy_desc(a.energy_kwh, b.energy_kwh));
    rows
}

fn compare_energy_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// kWh with 3 decimals, or the placeholder
pub fn format_energy(kwh: Option<f64>) -> String {
    match kwh {
        Some(v) if v.is_finite() => format!("{:.*}", ENERGY_DECIMALS, v),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Render rows as a fixed-width text table (`limit` 0 = all rows)
pub fn render_table(rows: &[DisplayRow], limit: usize) -> String {
    let shown = if limit == 0 { rows.len() } else { limit.min(rows.len()) };

    let comm_width = rows[..shown]
        .iter()
        .map(|r| r.comm.chars().count())
        .max()
        .unwrap_or(0)
        .max("COMM".len());

    let mut out = format!(
        "{:>8}  {:<comm_width$}  {:>12}\n",
        "PID",
        "COMM",
        "ENERGY (kWh)",
        comm_width = comm_width
    );

    for row in &rows[..shown] {
        out.push_str(&format!(
            "{:>8}  {:<comm_width$}  {:>12}\n",
            row.pid,
            row.comm,
            row.energy_display,
            comm_width = comm_width
        ));
    }

    if shown < rows.len() {
        out.push_str(&format!("... {} more\n", rows.len() - shown));
    }

    out
}
