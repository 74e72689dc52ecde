//! Occupancy timeline construction.
//!
//! Reconstructs, for every area and every minute of the observed period, how
//! many sessions were in progress.
//!
//! # Algorithm Summary
//!
//! 1. Validate every session against the registry (no partial results)
//! 2. Derive one global minute grid from the earliest start and latest end
//! 3. Per area, in parallel: mark `+1` at each session start and `-1` one
//!    minute past its end in a delta array
//! 4. Prefix-sum the delta array into per-minute counts
//!
//! This is O(sessions + minutes) per area rather than checking every session
//! against every minute.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::OccupancyError;
use crate::registry::{Area, AreaRegistry};
use crate::session::{Session, truncate_to_minute};
use crate::types::AreaId;

/// Default grid limit: two leap years of minutes.
pub const DEFAULT_MAX_GRID_MINUTES: usize = 2 * 366 * 24 * 60;

/// Configuration for timeline construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineConfig {
    /// Largest grid, in minutes, a run may allocate per area.
    /// Default: [`DEFAULT_MAX_GRID_MINUTES`].
    pub max_grid_minutes: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_grid_minutes: DEFAULT_MAX_GRID_MINUTES,
        }
    }
}

/// A contiguous run of whole minutes, `start` through `end()` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinuteGrid {
    start: NaiveDateTime,
    len: usize,
}

impl MinuteGrid {
    /// Grid from `start` to `end` inclusive. `None` if `end` precedes `start`.
    ///
    /// Both bounds are truncated to the minute.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        let span = (end - start).num_minutes();
        let len = usize::try_from(span).ok()?.checked_add(1)?;
        Some(Self { start, len })
    }

    /// Smallest grid covering every occupying session, or `None` if no
    /// session occupies a minute.
    pub fn covering<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Option<Self> {
        let (start, end) = sessions
            .into_iter()
            .filter_map(|s| Some((s.start(), s.end()?)))
            .reduce(|(lo, hi), (start, end)| (lo.min(start), hi.max(end)))?;
        Self::new(start, end)
    }

    pub const fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Last minute of the grid.
    pub fn end(&self) -> NaiveDateTime {
        self.minute_at(self.len.saturating_sub(1))
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The minute at `offset` from the grid start.
    pub fn minute_at(&self, offset: usize) -> NaiveDateTime {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.start + Duration::minutes(offset)
    }

    /// Offset of the minute containing `t`, if it lies on the grid.
    pub fn offset_of(&self, t: NaiveDateTime) -> Option<usize> {
        if t < self.start {
            return None;
        }
        let offset = usize::try_from((t - self.start).num_minutes()).ok()?;
        (offset < self.len).then_some(offset)
    }

    /// Every minute of the grid, in order.
    pub fn minutes(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.len).map(|i| self.minute_at(i))
    }

    /// Clips the inclusive range `first..=last` to the grid.
    ///
    /// Returns the start offset and the offset one past the last covered
    /// minute, or `None` if the range misses the grid entirely.
    fn clip(&self, first: NaiveDateTime, last: NaiveDateTime) -> Option<(usize, usize)> {
        let len = i64::try_from(self.len).ok()?;
        let lo = (first - self.start).num_minutes().max(0);
        let hi = (last - self.start).num_minutes().min(len - 1);
        if lo > hi {
            return None;
        }
        Some((usize::try_from(lo).ok()?, usize::try_from(hi + 1).ok()?))
    }
}

/// Per-minute concurrency over a [`MinuteGrid`].
///
/// Implemented by area timelines and building roll-ups so summary queries
/// work on either.
pub trait Occupancy {
    /// The minutes the counts cover.
    fn grid(&self) -> &MinuteGrid;

    /// One count per grid minute.
    fn counts(&self) -> &[u32];

    /// `(minute, count)` pairs in grid order.
    fn samples(&self) -> impl Iterator<Item = (NaiveDateTime, u32)> + '_ {
        self.grid().minutes().zip(self.counts().iter().copied())
    }
}

/// Concurrency counts for a single area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaTimeline {
    pub area: AreaId,
    pub grid: MinuteGrid,
    pub counts: Vec<u32>,
}

impl Occupancy for AreaTimeline {
    fn grid(&self) -> &MinuteGrid {
        &self.grid
    }

    fn counts(&self) -> &[u32] {
        &self.counts
    }
}

/// Per-area timelines sharing one grid.
///
/// Every registered area has a timeline, including areas without sessions.
/// A timeline without a grid means no session occupied any minute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    grid: Option<MinuteGrid>,
    areas: BTreeMap<AreaId, AreaTimeline>,
    /// Dates with a nonzero count in at least one area.
    observed_dates: BTreeSet<NaiveDate>,
}

impl Timeline {
    /// A timeline with no data.
    pub fn empty() -> Self {
        Self::default()
    }

    pub const fn grid(&self) -> Option<&MinuteGrid> {
        self.grid.as_ref()
    }

    pub const fn is_empty(&self) -> bool {
        self.grid.is_none()
    }

    /// Timeline for one area.
    ///
    /// Fails with `NoData` on an empty timeline and `UnknownArea` if the area
    /// was not part of the run.
    pub fn area(&self, area: &AreaId) -> Result<&AreaTimeline, OccupancyError> {
        if self.is_empty() {
            return Err(OccupancyError::NoData);
        }
        self.areas
            .get(area)
            .ok_or_else(|| OccupancyError::UnknownArea {
                area: area.clone(),
                index: None,
            })
    }

    /// Calendar dates on which any area had a session in progress.
    ///
    /// Dates of the grid outside this set (a closed library) are left out of
    /// per-date summaries.
    pub const fn observed_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.observed_dates
    }

    /// All area timelines, sorted by area.
    pub fn areas(&self) -> impl Iterator<Item = &AreaTimeline> {
        self.areas.values()
    }
}

/// Builds the occupancy timeline over the grid spanned by the sessions.
///
/// Zero-duration sessions are ignored and do not move the grid bounds. If no
/// session occupies a minute the result is [`Timeline::empty`].
///
/// # Errors
///
/// `UnknownArea` if any session references an area outside `registry`. The
/// check runs before any work, so no partial timeline is produced.
/// `GridTooLarge` if the sessions span more than the default grid limit.
pub fn build_timeline(
    sessions: &[Session],
    registry: &AreaRegistry,
) -> Result<Timeline, OccupancyError> {
    build_timeline_with(sessions, registry, &TimelineConfig::default())
}

/// [`build_timeline`] with explicit construction limits.
pub fn build_timeline_with(
    sessions: &[Session],
    registry: &AreaRegistry,
    config: &TimelineConfig,
) -> Result<Timeline, OccupancyError> {
    registry.validate_sessions(sessions)?;

    let Some(grid) = MinuteGrid::covering(sessions) else {
        tracing::debug!(
            sessions = sessions.len(),
            "no session occupies a minute; timeline is empty"
        );
        return Ok(Timeline::empty());
    };

    sweep(sessions, registry, grid, config)
}

/// Builds the occupancy timeline over a caller-chosen grid.
///
/// Sessions are clipped to the grid; sessions entirely outside it contribute
/// nothing. The grid is held to the default limit.
pub fn build_timeline_on_grid(
    sessions: &[Session],
    registry: &AreaRegistry,
    grid: MinuteGrid,
) -> Result<Timeline, OccupancyError> {
    registry.validate_sessions(sessions)?;
    sweep(sessions, registry, grid, &TimelineConfig::default())
}

fn sweep(
    sessions: &[Session],
    registry: &AreaRegistry,
    grid: MinuteGrid,
    config: &TimelineConfig,
) -> Result<Timeline, OccupancyError> {
    if grid.len() > config.max_grid_minutes {
        return Err(OccupancyError::GridTooLarge {
            minutes: grid.len(),
            limit: config.max_grid_minutes,
        });
    }

    let mut by_area: HashMap<&AreaId, Vec<&Session>> = HashMap::new();
    for session in sessions.iter().filter(|s| s.occupies_timeline()) {
        by_area.entry(session.area()).or_default().push(session);
    }

    // Each area's delta array is owned by one worker
    let areas: Vec<&Area> = registry.all_areas().collect();
    let timelines = areas
        .par_iter()
        .map(|area| {
            let members = by_area.get(&area.id).map_or(&[][..], Vec::as_slice);
            sweep_area(&area.id, members, grid)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        areas = timelines.len(),
        minutes = grid.len(),
        grid_start = %grid.start(),
        grid_end = %grid.end(),
        "built occupancy timeline"
    );

    let observed_dates = timelines
        .iter()
        .flat_map(|t| t.samples().filter(|&(_, count)| count > 0))
        .map(|(minute, _)| minute.date())
        .collect();

    Ok(Timeline {
        grid: Some(grid),
        observed_dates,
        areas: timelines
            .into_iter()
            .map(|t| (t.area.clone(), t))
            .collect(),
    })
}

/// Diff accumulation and prefix sum for one area.
fn sweep_area(
    area: &AreaId,
    sessions: &[&Session],
    grid: MinuteGrid,
) -> Result<AreaTimeline, OccupancyError> {
    // One extra slot absorbs the decrement of sessions ending on the last minute
    let mut delta = vec![0_i64; grid.len() + 1];
    for session in sessions {
        let Some(end) = session.end() else { continue };
        let Some((first, past_last)) = grid.clip(session.start(), end) else {
            continue;
        };
        delta[first] += 1;
        delta[past_last] -= 1;
    }

    let mut running = 0_i64;
    let counts = delta[..grid.len()]
        .iter()
        .map(|d| {
            running += d;
            u32::try_from(running).map_err(|_| OccupancyError::CountOverflow { area: area.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AreaTimeline {
        area: area.clone(),
        grid,
        counts,
    })
}
