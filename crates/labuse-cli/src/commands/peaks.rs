//! Peaks command: maximum concurrency per calendar day or ISO week.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use labuse_core::{
    Occupancy, Percentage, PercentageBasis, building_rollup, observed_partitioned_max,
};
use serde::Serialize;

use crate::{Config, PeakGrouping};
use crate::commands::util::compute_timeline;
use crate::dataset::Prepared;

/// A calendar bucket of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeriodKey {
    Day(NaiveDate),
    /// ISO year and week number.
    Week(i32, u32),
}

impl PeriodKey {
    pub fn of(minute: NaiveDateTime, grouping: PeakGrouping) -> Self {
        match grouping {
            PeakGrouping::Day => Self::Day(minute.date()),
            PeakGrouping::Week => {
                let week = minute.iso_week();
                Self::Week(week.year(), week.week())
            }
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(date) => write!(f, "{date}"),
            Self::Week(year, week) => write!(f, "{year}-W{week:02}"),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakRow {
    pub name: String,
    pub period: PeriodKey,
    pub peak: u32,
    pub peak_pct: Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakTable {
    pub areas: Vec<PeakRow>,
    pub buildings: Vec<PeakRow>,
}

fn rows(
    name: &str,
    occupancy: &impl Occupancy,
    capacity: u64,
    observed: &BTreeSet<NaiveDate>,
    grouping: PeakGrouping,
) -> Vec<PeakRow> {
    let peaks: BTreeMap<PeriodKey, u32> =
        observed_partitioned_max(occupancy, observed, |minute| PeriodKey::of(minute, grouping));
    peaks
        .into_iter()
        .map(|(period, peak)| PeakRow {
            name: name.to_string(),
            period,
            peak,
            peak_pct: Percentage::of(u64::from(peak), capacity, PercentageBasis::Instantaneous),
        })
        .collect()
}

/// Computes per-period peaks for every area and building.
///
/// Only minutes of dates with at least one session count, so a closed day
/// yields no row and does not pull a week's peak down to zero.
pub fn peak_table(prepared: &Prepared, config: &Config, grouping: PeakGrouping) -> Result<PeakTable> {
    let timeline = compute_timeline(prepared, config, true)?;
    if timeline.is_empty() {
        return Ok(PeakTable {
            areas: Vec::new(),
            buildings: Vec::new(),
        });
    }

    let observed = timeline.observed_dates();
    let mut areas = Vec::new();
    for area in prepared.registry.all_areas() {
        let area_timeline = timeline.area(&area.id)?;
        areas.extend(rows(
            area.id.as_str(),
            area_timeline,
            u64::from(area.capacity),
            observed,
            grouping,
        ));
    }

    let buildings = building_rollup(&timeline, &prepared.registry)
        .context("failed to roll up buildings")?
        .values()
        .flat_map(|b| rows(b.building.as_str(), b, b.capacity, observed, grouping))
        .collect();

    Ok(PeakTable { areas, buildings })
}

fn peak_line(columns: [&str; 4]) -> String {
    let [name, period, peak, peak_pct] = columns;
    format!("{name:<8}  {period:<10}  {peak:>4}  {peak_pct:>7}")
}

/// Formats a peak table for human-readable output.
pub fn format_peaks(table: &PeakTable, grouping: PeakGrouping) -> String {
    let mut output = String::new();
    let period = match grouping {
        PeakGrouping::Day => "DATE",
        PeakGrouping::Week => "WEEK",
    };

    if table.areas.is_empty() {
        writeln!(output, "No sessions occupy any minute.").unwrap();
        return output;
    }

    let sections = [("AREA", &table.areas), ("BUILDING", &table.buildings)];
    for (i, (heading, rows)) in sections.into_iter().enumerate() {
        if i > 0 {
            writeln!(output).unwrap();
        }
        writeln!(output, "{}", peak_line([heading, period, "PEAK", "PEAK%"])).unwrap();
        for row in rows {
            writeln!(
                output,
                "{}",
                peak_line([
                    &row.name,
                    &row.period.to_string(),
                    &row.peak.to_string(),
                    &row.peak_pct.to_string(),
                ])
            )
            .unwrap();
        }
    }

    output
}

/// Runs the peaks command.
pub fn run<W: Write>(
    writer: &mut W,
    prepared: &Prepared,
    config: &Config,
    grouping: PeakGrouping,
    json: bool,
) -> Result<()> {
    let table = peak_table(prepared, config, grouping)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&table)?)?;
    } else {
        write!(writer, "{}", format_peaks(&table, grouping))?;
    }

    Ok(())
}
