//! ProcEnergy Tracker - Demo CLI
//!
//! Replays a scripted sequence of snapshots through the poll driver and shows
//! the table and the aligned chart window after each cycle.

use procenergy_tracker_lib::aggregator::{LabelClock, LabelTimezone, SeriesAggregator};
use procenergy_tracker_lib::core::{ChartView, PollStatus};
use procenergy_tracker_lib::monitor::EnergyMonitor;
use procenergy_tracker_lib::provider::{ScriptStep, ScriptedSource};
use procenergy_tracker_lib::table;
use std::sync::Arc;
use std::time::Duration;

const MAX_POINTS: usize = 5;

fn script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::text("pid=42 comm=php energy=7200000000000\npid=7 comm=bash energy=3600000000000"),
        ScriptStep::text("pid=42 comm=php energy=7300000000000\npid=7 comm=bash energy=3700000000000 cpu=3"),
        // bash exits, nginx shows up
        ScriptStep::text("pid=42 comm=php energy=7400000000000\npid=88 comm=nginx energy=900000000000"),
        ScriptStep::unreadable("snapshot file is being rotated"),
        ScriptStep::text("# header only, no readings\n"),
        // pid 7 comes back under a new name
        ScriptStep::text("pid=42 comm=php energy=7500000000000\npid=7 comm=zsh energy=100000000000\npid=88 comm=nginx energy=950000000000"),
        ScriptStep::text("pid=42 comm=php energy=n/a\npid=88 comm=nginx energy=1000000000000"),
        ScriptStep::text("pid=88 comm=nginx energy=1100000000000"),
    ]
}

fn print_chart(chart: &ChartView) {
    println!("      timeline: {}", chart.labels.join(" | "));
    for dataset in &chart.datasets {
        let cells: Vec<String> = dataset
            .values
            .iter()
            .map(|v| match v {
                Some(kwh) => format!("{:>6.3}", kwh),
                None => format!("{:>6}", "."),
            })
            .collect();
        println!("      {:<18} {}", dataset.label, cells.join(" "));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("==============================================");
    println!("   ProcEnergy Tracker - Demo CLI");
    println!("==============================================\n");

    let steps = script();
    let cycles = steps.len();
    let aggregator = SeriesAggregator::new(MAX_POINTS)
        .with_clock(LabelClock::new(LabelTimezone::Local, "%H:%M:%S"));
    let monitor = EnergyMonitor::with_aggregator(
        Arc::new(ScriptedSource::new(steps)),
        aggregator,
        Duration::from_millis(1000),
        Duration::from_millis(500),
    );

    println!("  Source:     {}", monitor.source_name());
    println!("  Max points: {}\n", MAX_POINTS);

    for cycle in 1..=cycles {
        let status = monitor.poll_once().await;
        println!("[{}/{}] {}", cycle, cycles, status);

        let view = monitor.dashboard().await;
        match status {
            PollStatus::Ok { .. } => print!("{}", table::render_table(&view.rows, 0)),
            _ => println!("      (window unchanged)"),
        }
        print_chart(&view.chart);
        println!();

        tokio::time::sleep(Duration::from_millis(1000)).await;
    }

    let view = monitor.dashboard().await;
    println!("=== Summary ===\n");
    println!("  Snapshots ingested: {}", view.tick_count);
    println!("  Failed polls:       {}", view.failed_polls);
    println!("  Series tracked:     {}", view.chart.datasets.len());
    println!("  Points retained:    {}\n", view.chart.labels.len());

    println!("  Last snapshot as JSON rows:");
    println!("{}", serde_json::to_string_pretty(&view.rows)?);

    Ok(())
}
