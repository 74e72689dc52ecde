//! Run-level errors for the occupancy engine.
//!
//! Per-record problems are [`MalformedRecord`](crate::session::MalformedRecord)
//! values collected during normalization. The errors here are structural and
//! abort the run.

use thiserror::Error;

use crate::types::{AreaId, BuildingId};

/// Structural errors that make the whole run's results meaningless.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OccupancyError {
    /// A session references an area missing from the registry.
    ///
    /// `index` is the position of the offending session in the input slice,
    /// or `None` when the lookup did not originate from a session.
    #[error("unknown area {area}{}", index.map(|i| format!(" (session #{i})")).unwrap_or_default())]
    UnknownArea { area: AreaId, index: Option<usize> },

    /// The registry was built with the same area twice.
    #[error("area {area} is registered more than once")]
    DuplicateArea { area: AreaId },

    /// There are no sessions with a nonzero duration.
    #[error("no sessions occupy any minute; timeline is empty")]
    NoData,

    /// Areas of one building do not share the same minute grid.
    #[error("area {area} does not share the minute grid of building {building}")]
    InconsistentGrid { building: BuildingId, area: AreaId },

    /// The grid spanned by the input would exceed the configured size.
    ///
    /// Raised before any per-area array is allocated.
    #[error("timeline grid of {minutes} minutes exceeds the limit of {limit} minutes")]
    GridTooLarge { minutes: usize, limit: usize },

    /// A concurrency count did not fit the count type.
    #[error("concurrency count overflowed for area {area}")]
    CountOverflow { area: AreaId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_area_message_includes_index() {
        let err = OccupancyError::UnknownArea {
            area: AreaId::new("Z").unwrap(),
            index: Some(7),
        };
        assert_eq!(err.to_string(), "unknown area Z (session #7)");
    }

    #[test]
    fn unknown_area_message_without_index() {
        let err = OccupancyError::UnknownArea {
            area: AreaId::new("Z").unwrap(),
            index: None,
        };
        assert_eq!(err.to_string(), "unknown area Z");
    }

    #[test]
    fn grid_too_large_message() {
        let err = OccupancyError::GridTooLarge {
            minutes: 2_000_000,
            limit: 1_054_080,
        };
        assert_eq!(
            err.to_string(),
            "timeline grid of 2000000 minutes exceeds the limit of 1054080 minutes"
        );
    }
}
