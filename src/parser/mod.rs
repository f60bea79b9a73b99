//! Snapshot parser
//!
//! Turns the raw text published by the energy source into typed entries.
//! Each line holds whitespace-separated `key=value` tokens; a line becomes an
//! [`Entry`] only if it carries `pid`, `comm` and `energy`. Lines that don't
//! qualify are skipped silently, so one malformed line never hides the rest
//! of the blob.
//!
//! Policy: a line whose `pid` is text, negative or wider than a u32 is
//! skipped the same way as a line missing a key, since there is no series
//! identity to attach its reading to. Fractional pids are truncated.

use crate::core::{to_kwh, Entry, Error, FieldValue, Result, Snapshot};
use std::collections::{BTreeMap, HashSet};

/// Parse a raw blob into entries
///
/// Fails with [`Error::NoEntries`] (carrying the blob) when no line qualifies.
pub fn parse(raw_text: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut seen_pids = HashSet::new();

    for line in raw_text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let Some(entry) = parse_line(line) else {
            log::trace!("Skipping line without pid/comm/energy: {:?}", line);
            continue;
        };

        // First occurrence of a pid wins
        if !seen_pids.insert(entry.pid) {
            log::debug!("Duplicate pid {} in snapshot, keeping first line", entry.pid);
            continue;
        }

        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(Error::NoEntries {
            raw_text: raw_text.to_string(),
        });
    }

    Ok(entries)
}

/// Parse a raw blob and stamp it with `timestamp`
pub fn parse_snapshot(raw_text: &str, timestamp: i64) -> Result<Snapshot> {
    let entries = parse(raw_text)?;
    Ok(Snapshot {
        timestamp,
        entries,
        raw_text: raw_text.to_string(),
    })
}

/// Parse one line into an entry, or `None` if it lacks a required key
pub fn parse_line(line: &str) -> Option<Entry> {
    let mut fields = BTreeMap::new();
    let mut comm_raw = None;

    for (key, value) in scan_pairs(line) {
        if key == "comm" {
            comm_raw = Some(value);
        }
        fields.insert(key, coerce_value(value));
    }

    let comm = comm_raw?.to_string();
    let pid = fields.get("pid").and_then(coerce_pid)?;
    let energy_raw = fields
        .get("energy")?
        .as_number()
        .filter(|v| v.is_finite());
    let energy_converted = energy_raw.and_then(to_kwh);

    Some(Entry {
        pid,
        comm,
        energy_raw,
        energy_converted,
        fields,
        raw_line: line.to_string(),
    })
}

/// Collect the `key=value` pairs of a line, keys lowercased
pub fn scan_pairs(line: &str) -> Vec<(String, &str)> {
    line.split_whitespace()
        .filter_map(split_pair)
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}

/// Find the pair in a single token.
///
/// The key is the run of word characters right before the first `=` that has
/// one; the value is the rest of the token and must be non-empty.
fn split_pair(token: &str) -> Option<(&str, &str)> {
    let bytes = token.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }

        let start = bytes[..i]
            .iter()
            .rposition(|c| !is_word_byte(*c))
            .map_or(0, |p| p + 1);

        if start < i && i + 1 < bytes.len() {
            return Some((&token[start..i], &token[i + 1..]));
        }
    }

    None
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Store a token as a number when it lexically is one, otherwise as text
pub fn coerce_value(token: &str) -> FieldValue {
    if looks_numeric(token) {
        if let Ok(n) = token.parse::<f64>() {
            return FieldValue::Number(n);
        }
    }
    FieldValue::Text(token.to_string())
}

/// Optionally signed integer or decimal, with an optional exponent
fn looks_numeric(token: &str) -> bool {
    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (mantissa, None),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
    }
}

/// Pids must be non-negative and fit a u32; fractions are truncated.
///
/// `None` disqualifies the whole line (see the module docs).
fn coerce_pid(value: &FieldValue) -> Option<u32> {
    let n = value.as_number()?;
    if !n.is_finite() || n < 0.0 || n.trunc() > u32::MAX as f64 {
        return None;
    }
    Some(n.trunc() as u32)
}
