//! ProcEnergy Tracker library
//!
//! Parses per-process energy snapshots, keeps them in a bounded, aligned
//! time-series window and projects a sorted table of the latest sample.

pub mod aggregator;
pub mod core;
pub mod monitor;
pub mod parser;
pub mod provider;
pub mod table;
