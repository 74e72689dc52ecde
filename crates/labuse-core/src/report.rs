//! Utilization tables for the reporting layer.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::OccupancyError;
use crate::registry::AreaRegistry;
use crate::session::Session;
use crate::summary::{
    Percentage, PercentageBasis, building_rollup, daily_peaks, daily_usage_minutes, peak,
    percentage_of_capacity, session_stats,
};
use crate::timeline::{Occupancy, Timeline};
use crate::types::{AreaId, BuildingId};

/// Configuration for report generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Minutes per day the facility counts as open.
    /// Default: 1440 (open around the clock).
    pub open_minutes_per_day: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            open_minutes_per_day: 24 * 60,
        }
    }
}

/// One calendar date of one area or building.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRow {
    pub date: NaiveDate,
    pub peak: u32,
    pub peak_pct: Percentage,
    /// Occupied computer-minutes.
    pub usage_minutes: u64,
    pub usage_pct: Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaRow {
    pub area: AreaId,
    pub building: BuildingId,
    pub floor: String,
    pub capacity: u32,
    pub peak: u32,
    pub peak_pct: Percentage,
    pub sessions: usize,
    pub zero_duration_sessions: usize,
    pub total_minutes: u64,
    pub days: Vec<DayRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingRow {
    pub building: BuildingId,
    pub capacity: u64,
    pub peak: u32,
    pub peak_pct: Percentage,
    pub days: Vec<DayRow>,
}

/// Area and building utilization over one grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationReport {
    pub grid_start: Option<NaiveDateTime>,
    pub grid_end: Option<NaiveDateTime>,
    pub open_minutes_per_day: u32,
    pub areas: Vec<AreaRow>,
    pub buildings: Vec<BuildingRow>,
}

impl UtilizationReport {
    fn empty(config: &ReportConfig) -> Self {
        Self {
            grid_start: None,
            grid_end: None,
            open_minutes_per_day: config.open_minutes_per_day,
            areas: Vec::new(),
            buildings: Vec::new(),
        }
    }
}

/// Assembles per-area and per-building tables.
///
/// `sessions` should be the accepted sessions the timeline was built from;
/// they only feed the session count columns. An empty timeline yields a
/// report without rows.
pub fn build_report(
    timeline: &Timeline,
    registry: &AreaRegistry,
    sessions: &[Session],
    config: &ReportConfig,
) -> Result<UtilizationReport, OccupancyError> {
    let Some(grid) = timeline.grid() else {
        return Ok(UtilizationReport::empty(config));
    };

    let stats = session_stats(sessions);

    let areas = registry
        .all_areas()
        .map(|area| -> Result<_, OccupancyError> {
            let area_timeline = timeline.area(&area.id)?;
            let area_peak = peak(area_timeline);
            let area_stats = stats.get(&area.id).copied().unwrap_or_default();
            Ok(AreaRow {
                area: area.id.clone(),
                building: area.building.clone(),
                floor: area.floor.clone(),
                capacity: area.capacity,
                peak: area_peak,
                peak_pct: percentage_of_capacity(
                    registry,
                    &area.id,
                    u64::from(area_peak),
                    PercentageBasis::Instantaneous,
                )?,
                sessions: area_stats.sessions,
                zero_duration_sessions: area_stats.zero_duration,
                total_minutes: area_stats.total_minutes,
                days: day_rows(
                    area_timeline,
                    u64::from(area.capacity),
                    timeline.observed_dates(),
                    config,
                ),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let buildings = building_rollup(timeline, registry)?
        .into_values()
        .map(|b| {
            let building_peak = peak(&b);
            BuildingRow {
                peak: building_peak,
                peak_pct: Percentage::of(
                    u64::from(building_peak),
                    b.capacity,
                    PercentageBasis::Instantaneous,
                ),
                days: day_rows(&b, b.capacity, timeline.observed_dates(), config),
                building: b.building,
                capacity: b.capacity,
            }
        })
        .collect();

    Ok(UtilizationReport {
        grid_start: Some(grid.start()),
        grid_end: Some(grid.end()),
        open_minutes_per_day: config.open_minutes_per_day,
        areas,
        buildings,
    })
}

/// One row per observed date; closed days are left out.
fn day_rows(
    occupancy: &impl Occupancy,
    capacity: u64,
    observed: &BTreeSet<NaiveDate>,
    config: &ReportConfig,
) -> Vec<DayRow> {
    let daily = PercentageBasis::Daily {
        open_minutes_per_day: config.open_minutes_per_day,
    };
    let usage = daily_usage_minutes(occupancy, observed);

    daily_peaks(occupancy, observed)
        .into_iter()
        .map(|(date, day_peak)| {
            let usage_minutes = usage.get(&date).copied().unwrap_or(0);
            DayRow {
                date,
                peak: day_peak,
                peak_pct: Percentage::of(
                    u64::from(day_peak),
                    capacity,
                    PercentageBasis::Instantaneous,
                ),
                usage_minutes,
                usage_pct: Percentage::of(usage_minutes, capacity, daily),
            }
        })
        .collect()
}
