//! End-to-end tests: source text through parser, aggregator and table

use procenergy_tracker_lib::aggregator::{LabelClock, LabelTimezone, SeriesAggregator};
use procenergy_tracker_lib::core::{Config, FailureReason, PollStatus, SnapshotFailure};
use procenergy_tracker_lib::monitor::EnergyMonitor;
use procenergy_tracker_lib::parser;
use procenergy_tracker_lib::provider::{fetch_snapshot, FileSource};
use procenergy_tracker_lib::table;
use std::sync::Arc;

const SOURCE: &str = "pid=42 comm=php energy=7200000000000\npid=7 comm=bash energy=3600000000000";

#[test]
fn test_single_ingest_scenario() {
    let snapshot = parser::parse_snapshot(SOURCE, 1_700_000_000).unwrap();

    let mut aggregator = SeriesAggregator::new(300)
        .with_clock(LabelClock::new(LabelTimezone::Utc, "%H:%M:%S"));
    aggregator.ingest(&snapshot);

    assert_eq!(aggregator.series().len(), 2);
    let php = aggregator.series_for(42).unwrap();
    let bash = aggregator.series_for(7).unwrap();
    assert!((php.latest().unwrap() - 2.0).abs() < 1e-9);
    assert!((bash.latest().unwrap() - 1.0).abs() < 1e-9);

    let rows = table::project(&snapshot);
    let pids: Vec<u32> = rows.iter().map(|r| r.pid).collect();
    assert_eq!(pids, vec![42, 7]);
    assert_eq!(rows[0].energy_display, "2.000");
    assert_eq!(rows[1].energy_display, "1.000");
}

#[test]
fn test_delivery_contract_json() {
    let snapshot = parser::parse_snapshot(SOURCE, 1_700_000_000).unwrap();
    let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["timestamp"], 1_700_000_000);
    assert_eq!(json["rawText"], SOURCE);
    assert_eq!(json["entries"][0]["pid"], 42);
    assert_eq!(json["entries"][0]["comm"], "php");
    assert_eq!(json["entries"][0]["fields"]["comm"], "php");
    assert_eq!(json["entries"][1]["rawLine"], "pid=7 comm=bash energy=3600000000000");

    let failure = SnapshotFailure::from(parser::parse("junk").unwrap_err());
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["reason"], "no-entries");
    assert_eq!(json["rawText"], "junk");
}

#[test]
fn test_chart_view_serializes_gaps_as_null() {
    let mut aggregator = SeriesAggregator::new(300);
    aggregator.ingest(&parser::parse_snapshot(SOURCE, 1).unwrap());
    aggregator.ingest(&parser::parse_snapshot("pid=7 comm=bash energy=0", 2).unwrap());

    let json = serde_json::to_value(aggregator.chart_view()).unwrap();
    let php = &json["datasets"][0];
    assert_eq!(php["label"], "php (pid 42)");
    assert!(php["values"][1].is_null());
    assert_eq!(json["datasets"][1]["values"][1], 0.0);
}

#[test]
fn test_file_source_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.txt");

    let source = FileSource::new(&path);
    let failure = fetch_snapshot(&source, 0).unwrap_err();
    assert_eq!(failure.reason, FailureReason::UnreadableSource);

    std::fs::write(&path, SOURCE).unwrap();
    let snapshot = fetch_snapshot(&source, 5).unwrap();
    assert_eq!(snapshot.entries.len(), 2);
}

#[tokio::test]
async fn test_monitor_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.txt");
    std::fs::write(&path, SOURCE).unwrap();

    let mut config = Config::default();
    config.general.max_points = 2;
    config.display.timezone = "utc".to_string();

    let monitor = EnergyMonitor::new(Arc::new(FileSource::new(&path)), &config);
    for _ in 0..3 {
        assert!(monitor.poll_once().await.is_ok());
    }

    std::fs::remove_file(&path).unwrap();
    let status = monitor.poll_once().await;
    assert!(matches!(status, PollStatus::Failed { .. }));

    let view = monitor.dashboard().await;
    assert_eq!(view.tick_count, 3);
    assert_eq!(view.chart.labels.len(), 2);
    assert!(view.chart.datasets.iter().all(|d| d.values.len() == 2));
    assert_eq!(view.rows[0].pid, 42);
    assert_eq!(view.last_raw_text, SOURCE);
}
