//! Lab utilization CLI library.
//!
//! This crate provides the CLI interface for the occupancy engine.

mod cli;
pub mod commands;
mod config;
pub mod dataset;

pub use cli::{CacheAction, Cli, Commands, PeakGrouping};
pub use config::Config;
