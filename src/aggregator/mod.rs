//! Series aggregator
//!
//! Keeps one series per pid, all aligned to a shared timeline:
//! - every ingest appends exactly one slot to the timeline and to every series
//! - pids missing from a tick get a "no data" slot (`None`), never zero
//! - the window is bounded by `max_points`; trimming drops the oldest slots
//!   from the timeline and every series together
//!
//! A pid that disappears and comes back resumes its old series. If the OS
//! reuses a pid for another process, the histories are merged and only the
//! label changes. Both are policy choices, as is the parser's rule that a
//! line whose pid is not a non-negative integer is skipped (see `parser`).

use crate::core::{display_label, ChartDataset, ChartView, Config, DisplayConfig, Snapshot};
use chrono::{DateTime, Local};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;

/// Default number of retained timeline points
pub const DEFAULT_MAX_POINTS: usize = 300;

/// Timezone used for timeline labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTimezone {
    Local,
    Utc,
}

/// Formats sample timestamps into timeline labels
#[derive(Debug, Clone)]
pub struct LabelClock {
    timezone: LabelTimezone,
    format: String,
}

impl LabelClock {
    pub fn new(timezone: LabelTimezone, format: &str) -> Self {
        Self {
            timezone,
            format: format.to_string(),
        }
    }

    pub fn from_config(display: &DisplayConfig) -> Self {
        let timezone = match display.timezone.as_str() {
            "utc" => LabelTimezone::Utc,
            _ => LabelTimezone::Local,
        };
        Self::new(timezone, &display.label_format)
    }

    /// Label for a unix timestamp; falls back to the raw number if it can't be formatted
    pub fn label(&self, timestamp: i64) -> String {
        let Some(utc) = DateTime::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };

        let mut label = String::new();
        let written = match self.timezone {
            LabelTimezone::Utc => write!(label, "{}", utc.format(&self.format)),
            LabelTimezone::Local => write!(label, "{}", utc.with_timezone(&Local).format(&self.format)),
        };

        match written {
            Ok(()) => label,
            Err(_) => timestamp.to_string(),
        }
    }
}

impl Default for LabelClock {
    fn default() -> Self {
        Self::new(LabelTimezone::Local, "%H:%M:%S")
    }
}

/// Energy history of one pid
#[derive(Debug, Clone)]
pub struct Series {
    pid: u32,
    comm: String,
    display_label: String,
    values: VecDeque<Option<f64>>,
}

impl Series {
    fn new(pid: u32, comm: &str, backfill: usize) -> Self {
        Self {
            pid,
            comm: comm.to_string(),
            display_label: display_label(comm, pid),
            values: std::iter::repeat(None).take(backfill).collect(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Most recently observed process name
    pub fn comm(&self) -> &str {
        &self.comm
    }

    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    /// Values aligned with the timeline; `None` marks "no data"
    pub fn values(&self) -> &VecDeque<Option<f64>> {
        &self.values
    }

    /// Value in the newest slot
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied().flatten()
    }

    /// True when the whole retained window is "no data"
    pub fn is_idle(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    fn rename(&mut self, comm: &str) {
        if self.comm != comm {
            log::debug!("pid {} renamed from {} to {}", self.pid, self.comm, comm);
            self.comm = comm.to_string();
            self.display_label = display_label(comm, self.pid);
        }
    }
}

/// Aligned multi-series window over successive snapshots
#[derive(Debug, Clone)]
pub struct SeriesAggregator {
    timeline: VecDeque<String>,
    /// Insertion order (first-seen pid)
    series: Vec<Series>,
    index: HashMap<u32, usize>,
    tick_count: u64,
    max_points: usize,
    prune_idle: bool,
    clock: LabelClock,
}

impl SeriesAggregator {
    /// Create an aggregator retaining at most `max_points` slots (clamped to 1)
    pub fn new(max_points: usize) -> Self {
        Self {
            timeline: VecDeque::new(),
            series: Vec::new(),
            index: HashMap::new(),
            tick_count: 0,
            max_points: max_points.max(1),
            prune_idle: false,
            clock: LabelClock::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.general.max_points)
            .with_clock(LabelClock::from_config(&config.display))
            .with_idle_pruning(config.general.prune_idle_series)
    }

    pub fn with_clock(mut self, clock: LabelClock) -> Self {
        self.clock = clock;
        self
    }

    /// Remove series whose retained window holds no data at all
    pub fn with_idle_pruning(mut self, enabled: bool) -> Self {
        self.prune_idle = enabled;
        self
    }

    /// Fold one snapshot into the window.
    ///
    /// Runs to completion without failing; alignment holds before and after.
    pub fn ingest(&mut self, snapshot: &Snapshot) {
        self.timeline.push_back(self.clock.label(snapshot.timestamp));
        self.tick_count += 1;

        let backfill = self.timeline.len() - 1;
        let mut seen = vec![false; self.series.len()];

        for entry in &snapshot.entries {
            let idx = match self.index.get(&entry.pid) {
                Some(&idx) => idx,
                None => {
                    self.series.push(Series::new(entry.pid, &entry.comm, backfill));
                    seen.push(false);
                    let idx = self.series.len() - 1;
                    self.index.insert(entry.pid, idx);
                    idx
                }
            };

            let series = &mut self.series[idx];
            series.rename(&entry.comm);

            let value = entry.energy_converted.filter(|v| v.is_finite());
            if seen[idx] {
                // Repeated pid within one tick: overwrite this tick's slot
                if let Some(slot) = series.values.back_mut() {
                    *slot = value;
                }
            } else {
                series.values.push_back(value);
                seen[idx] = true;
            }
        }

        for (series, &seen) in self.series.iter_mut().zip(&seen) {
            if !seen {
                series.values.push_back(None);
            }
        }

        self.trim();

        if self.prune_idle {
            self.prune_idle_series();
        }

        debug_assert!(self.check_alignment());
    }

    fn trim(&mut self) {
        if self.timeline.len() <= self.max_points {
            return;
        }

        let drop = self.timeline.len() - self.max_points;
        self.timeline.drain(..drop);
        for series in &mut self.series {
            series.values.drain(..drop);
        }
    }

    fn prune_idle_series(&mut self) {
        let before = self.series.len();
        self.series.retain(|s| !s.is_idle());

        if self.series.len() != before {
            log::debug!("Pruned {} idle series", before - self.series.len());
            self.index = self
                .series
                .iter()
                .enumerate()
                .map(|(idx, s)| (s.pid, idx))
                .collect();
        }
    }

    /// Timeline labels, oldest first
    pub fn timeline(&self) -> &VecDeque<String> {
        &self.timeline
    }

    /// All series in first-seen order
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn series_for(&self, pid: u32) -> Option<&Series> {
        self.index.get(&pid).map(|&idx| &self.series[idx])
    }

    /// Total number of ingested snapshots, including trimmed ones
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Every series has exactly one value per timeline slot
    pub fn check_alignment(&self) -> bool {
        self.timeline.len() <= self.max_points
            && self.series.iter().all(|s| s.values.len() == self.timeline.len())
    }

    /// Owned copy of the window for chart consumers
    pub fn chart_view(&self) -> ChartView {
        ChartView {
            labels: self.timeline.iter().cloned().collect(),
            datasets: self
                .series
                .iter()
                .map(|s| ChartDataset {
                    pid: s.pid,
                    label: s.display_label.clone(),
                    values: s.values.iter().copied().collect(),
                })
                .collect(),
        }
    }
}

impl Default for SeriesAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Entry;

    fn utc_aggregator(max_points: usize) -> SeriesAggregator {
        SeriesAggregator::new(max_points).with_clock(LabelClock::new(LabelTimezone::Utc, "%H:%M:%S"))
    }

    fn snapshot(timestamp: i64, readings: &[(u32, &str, f64)]) -> Snapshot {
        Snapshot {
            timestamp,
            entries: readings
                .iter()
                .map(|&(pid, comm, uj)| Entry::new(pid, comm, uj))
                .collect(),
            raw_text: String::new(),
        }
    }

    const ONE_KWH: f64 = 3_600_000_000_000.0;

    #[test]
    fn test_first_ingest() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(0, &[(42, "php", 2.0 * ONE_KWH), (7, "bash", ONE_KWH)]));

        assert_eq!(agg.timeline().len(), 1);
        assert_eq!(agg.timeline()[0], "00:00:00");
        assert_eq!(agg.tick_count(), 1);
        assert_eq!(agg.series().len(), 2);

        let php = agg.series_for(42).unwrap();
        assert!((php.latest().unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(php.display_label(), "php (pid 42)");
        assert!((agg.series_for(7).unwrap().latest().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_is_none_not_zero() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(1, &[(100, "a", ONE_KWH), (200, "b", 0.0)]));
        agg.ingest(&snapshot(2, &[(200, "b", 0.0)]));
        agg.ingest(&snapshot(3, &[(100, "a", ONE_KWH), (200, "b", 0.0)]));

        let values = agg.series_for(100).unwrap().values();
        assert_eq!(values.len(), 3);
        assert!(values[0].is_some());
        assert_eq!(values[1], None);
        assert!(values[2].is_some());

        // A real zero stays zero
        assert_eq!(agg.series_for(200).unwrap().values()[1], Some(0.0));
        assert_eq!(agg.series().len(), 2);
    }

    #[test]
    fn test_new_series_is_backfilled() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(1, &[(1, "a", 1.0)]));
        agg.ingest(&snapshot(2, &[(1, "a", 1.0)]));
        agg.ingest(&snapshot(3, &[(1, "a", 1.0), (2, "b", ONE_KWH)]));

        let values = agg.series_for(2).unwrap().values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!(values[2].is_some());
        assert!(agg.check_alignment());
    }

    #[test]
    fn test_window_trim() {
        let mut agg = utc_aggregator(3);
        for ts in 1..=5 {
            agg.ingest(&snapshot(ts, &[(1, "a", ts as f64 * ONE_KWH)]));
        }
        agg.ingest(&snapshot(6, &[(2, "b", ONE_KWH)]));

        let labels: Vec<_> = agg.timeline().iter().cloned().collect();
        assert_eq!(labels, vec!["00:00:04", "00:00:05", "00:00:06"]);
        assert_eq!(agg.tick_count(), 6);

        let a: Vec<_> = agg.series_for(1).unwrap().values().iter().copied().collect();
        assert_eq!(a.len(), 3);
        assert!((a[0].unwrap() - 4.0).abs() < 1e-9);
        assert!((a[1].unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(a[2], None);

        let b: Vec<_> = agg.series_for(2).unwrap().values().iter().copied().collect();
        assert_eq!(b.len(), 3);
        assert_eq!(&b[..2], &[None, None]);
    }

    #[test]
    fn test_window_trim_five_ticks() {
        let mut agg = utc_aggregator(3);
        for ts in 1..=5 {
            agg.ingest(&snapshot(ts, &[(1, "a", ts as f64 * ONE_KWH), (2, "b", ONE_KWH)]));
        }

        assert_eq!(agg.timeline().len(), 3);
        assert_eq!(agg.timeline()[0], "00:00:03");
        for series in agg.series() {
            assert_eq!(series.values().len(), 3);
        }
        let first = agg.series_for(1).unwrap().values()[0].unwrap();
        assert!((first - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rename_keeps_history() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(1, &[(7, "bash", ONE_KWH)]));
        agg.ingest(&snapshot(2, &[(7, "zsh", ONE_KWH)]));

        assert_eq!(agg.series().len(), 1);
        let series = agg.series_for(7).unwrap();
        assert_eq!(series.values().len(), 2);
        assert_eq!(series.comm(), "zsh");
        assert_eq!(series.display_label(), "zsh (pid 7)");
    }

    #[test]
    fn test_non_finite_energy_is_gap() {
        let mut agg = utc_aggregator(300);
        let mut entry = Entry::new(3, "x", 1.0);
        entry.energy_converted = Some(f64::NAN);
        agg.ingest(&Snapshot {
            timestamp: 1,
            entries: vec![entry, Entry::new(4, "y", f64::INFINITY)],
            raw_text: String::new(),
        });

        assert_eq!(agg.series_for(3).unwrap().values()[0], None);
        assert_eq!(agg.series_for(4).unwrap().values()[0], None);
    }

    #[test]
    fn test_repeated_pid_in_one_tick_keeps_alignment() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(1, &[(5, "a", ONE_KWH), (5, "a", 2.0 * ONE_KWH)]));

        let series = agg.series_for(5).unwrap();
        assert_eq!(series.values().len(), 1);
        assert!((series.latest().unwrap() - 2.0).abs() < 1e-9);
        assert!(agg.check_alignment());
    }

    #[test]
    fn test_series_order_is_first_seen() {
        let mut agg = utc_aggregator(300);
        agg.ingest(&snapshot(1, &[(30, "c", 1.0), (10, "a", 1.0)]));
        agg.ingest(&snapshot(2, &[(20, "b", 1.0), (10, "a", 1.0), (30, "c", 1.0)]));

        let pids: Vec<_> = agg.series().iter().map(|s| s.pid()).collect();
        assert_eq!(pids, vec![30, 10, 20]);

        let view = agg.chart_view();
        assert_eq!(view.labels.len(), 2);
        let labels: Vec<_> = view.datasets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["c (pid 30)", "a (pid 10)", "b (pid 20)"]);
    }

    #[test]
    fn test_absent_series_ages_out() {
        let mut agg = utc_aggregator(2);
        agg.ingest(&snapshot(1, &[(1, "gone", ONE_KWH), (2, "stay", ONE_KWH)]));
        agg.ingest(&snapshot(2, &[(2, "stay", ONE_KWH)]));
        agg.ingest(&snapshot(3, &[(2, "stay", ONE_KWH)]));

        // Kept, but holds nothing but gaps
        let gone = agg.series_for(1).unwrap();
        assert!(gone.is_idle());
        assert_eq!(gone.values().len(), 2);

        // Coming back resumes the same series
        agg.ingest(&snapshot(4, &[(1, "gone", ONE_KWH)]));
        assert_eq!(agg.series().len(), 2);
        assert!(agg.series_for(1).unwrap().latest().is_some());
    }

    #[test]
    fn test_idle_pruning() {
        let mut agg = utc_aggregator(2).with_idle_pruning(true);
        agg.ingest(&snapshot(1, &[(1, "gone", ONE_KWH), (2, "stay", ONE_KWH)]));
        agg.ingest(&snapshot(2, &[(2, "stay", ONE_KWH)]));
        assert!(agg.series_for(1).is_some());

        agg.ingest(&snapshot(3, &[(2, "stay", ONE_KWH)]));
        assert!(agg.series_for(1).is_none());
        assert_eq!(agg.series().len(), 1);
        assert_eq!(agg.series_for(2).unwrap().pid(), 2);
        assert!(agg.check_alignment());
    }

    #[test]
    fn test_alignment_over_random_churn() {
        let mut agg = utc_aggregator(7);
        for tick in 0..50u32 {
            let readings: Vec<(u32, &str, f64)> = (0..10u32)
                .filter(|pid| (tick + pid) % 3 != 0)
                .map(|pid| (pid + tick % 4, "p", ONE_KWH))
                .collect();
            agg.ingest(&snapshot(tick as i64, &readings));
            assert!(agg.check_alignment());
            assert!(agg.timeline().len() <= 7);
        }
    }

    #[test]
    fn test_zero_max_points_is_clamped() {
        let mut agg = utc_aggregator(0);
        assert_eq!(agg.max_points(), 1);
        agg.ingest(&snapshot(1, &[(1, "a", 1.0)]));
        agg.ingest(&snapshot(2, &[(1, "a", 1.0)]));
        assert_eq!(agg.timeline().len(), 1);
        assert_eq!(agg.timeline()[0], "00:00:02");
    }

    #[test]
    fn test_huge_window_grows_on_demand() {
        // Storage follows the data, not the bound
        let mut agg = utc_aggregator(usize::MAX);
        assert_eq!(agg.max_points(), usize::MAX);

        agg.ingest(&snapshot(1, &[(1, "a", ONE_KWH)]));
        agg.ingest(&snapshot(2, &[(2, "b", ONE_KWH)]));

        assert_eq!(agg.timeline().len(), 2);
        assert_eq!(agg.series_for(2).unwrap().values().len(), 2);
        assert!(agg.check_alignment());
    }

    #[test]
    fn test_huge_window_from_config() {
        let config: Config = toml::from_str("[general]\nmax_points = 1099511627776\n").unwrap();
        assert!(config.validate().is_ok());

        let mut agg = SeriesAggregator::from_config(&config);
        agg.ingest(&snapshot(1, &[(1, "a", ONE_KWH)]));
        assert_eq!(agg.max_points(), 1 << 40);
        assert_eq!(agg.timeline().len(), 1);
    }

    #[test]
    fn test_label_clock() {
        let clock = LabelClock::new(LabelTimezone::Utc, "%Y-%m-%d %H:%M");
        assert_eq!(clock.label(86_400 + 3_660), "1970-01-02 01:01");
    }
}
