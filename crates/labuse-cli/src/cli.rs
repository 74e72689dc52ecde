//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Computer-lab utilization statistics.
///
/// Reads classified login sessions and reports how many computers were in use
/// per area and building, minute by minute.
#[derive(Debug, Parser)]
#[command(name = "labuse", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show area and building utilization tables.
    Report {
        /// Dataset file (JSON with `areas` and `sessions`).
        dataset: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Always recompute instead of reading the result cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Show the minute-by-minute concurrency of one area.
    Timeline {
        /// Dataset file (JSON with `areas` and `sessions`).
        dataset: PathBuf,

        /// Area to show.
        #[arg(long)]
        area: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show peak concurrency per area for each day or week.
    Peaks {
        /// Dataset file (JSON with `areas` and `sessions`).
        dataset: PathBuf,

        /// Calendar bucket to group minutes by.
        #[arg(long, value_enum, default_value_t = PeakGrouping::Day)]
        by: PeakGrouping,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the result cache.
    #[command(subcommand)]
    Cache(CacheAction),
}

/// Calendar buckets for `labuse peaks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeakGrouping {
    Day,
    Week,
}

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache location and size.
    Stats,
    /// Remove all cached timelines.
    Clear,
}
