//! Core domain logic for lab utilization statistics.
//!
//! This crate contains:
//! - Session model: validating raw login records
//! - Area registry: known areas and their computer counts
//! - Timeline engine: per-area, per-minute concurrency via a sweep
//! - Summary queries and report tables over a finished timeline

mod error;
pub mod registry;
pub mod report;
pub mod session;
pub mod summary;
pub mod timeline;
pub mod types;

pub use error::OccupancyError;
pub use registry::{Area, AreaRegistry};
pub use report::{ReportConfig, UtilizationReport, build_report};
pub use session::{
    MalformedRecord, NormalizedBatch, RawSession, RejectedRecord, Session, normalize,
    normalize_all,
};
pub use summary::{
    BuildingTimeline, Percentage, PercentageBasis, building_rollup, daily_max,
    observed_partitioned_max, overall_max, partitioned_max, percentage_of_capacity,
};
pub use timeline::{
    AreaTimeline, DEFAULT_MAX_GRID_MINUTES, MinuteGrid, Occupancy, Timeline, TimelineConfig,
    build_timeline, build_timeline_on_grid, build_timeline_with,
};
pub use types::{AreaId, BuildingId, ValidationError};
