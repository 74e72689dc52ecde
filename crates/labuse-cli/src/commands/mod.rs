//! CLI subcommand implementations.

pub mod cache;
pub mod peaks;
pub mod report;
pub mod timeline;
pub mod util;
