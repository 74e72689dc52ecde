//! Report command for area and building utilization tables.
//!
//! This module implements `labuse report` with human-readable and JSON output.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use labuse_core::{UtilizationReport, build_report};

use crate::Config;
use crate::commands::util::{compute_timeline, format_minutes};
use crate::dataset::Prepared;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Formats one row of the area table.
fn area_line(columns: [&str; 8]) -> String {
    let [area, building, floor, capacity, peak, peak_pct, sessions, time] = columns;
    format!(
        "{area:<8}  {building:<8}  {floor:<5}  {capacity:>4}  {peak:>4}  {peak_pct:>7}  {sessions:>8}  {time:>7}"
    )
}

fn building_line(columns: [&str; 4]) -> String {
    let [building, capacity, peak, peak_pct] = columns;
    format!("{building:<8}  {capacity:>4}  {peak:>4}  {peak_pct:>7}")
}

fn day_line(columns: [&str; 6]) -> String {
    let [area, date, peak, peak_pct, usage, usage_pct] = columns;
    format!("{area:<8}  {date:<10}  {peak:>4}  {peak_pct:>7}  {usage:>7}  {usage_pct:>7}")
}

/// Formats report data for human-readable output.
pub fn format_report(report: &UtilizationReport) -> String {
    let mut output = String::new();

    let (Some(start), Some(end)) = (report.grid_start, report.grid_end) else {
        writeln!(output, "LAB UTILIZATION").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "No sessions occupy any minute.").unwrap();
        return output;
    };

    writeln!(
        output,
        "LAB UTILIZATION: {} to {}",
        start.format(TIMESTAMP_FORMAT),
        end.format(TIMESTAMP_FORMAT)
    )
    .unwrap();
    writeln!(output, "Open minutes per day: {}", report.open_minutes_per_day).unwrap();

    writeln!(output).unwrap();
    writeln!(output, "BY AREA").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "{}",
        area_line(["AREA", "BUILDING", "FLOOR", "CAP", "PEAK", "PEAK%", "SESSIONS", "TIME"])
    )
    .unwrap();
    for row in &report.areas {
        writeln!(
            output,
            "{}",
            area_line([
                row.area.as_str(),
                row.building.as_str(),
                &row.floor,
                &row.capacity.to_string(),
                &row.peak.to_string(),
                &row.peak_pct.to_string(),
                &row.sessions.to_string(),
                &format_minutes(row.total_minutes),
            ])
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY BUILDING").unwrap();
    writeln!(output, "───────────").unwrap();
    writeln!(output, "{}", building_line(["BUILDING", "CAP", "PEAK", "PEAK%"])).unwrap();
    for row in &report.buildings {
        writeln!(
            output,
            "{}",
            building_line([
                row.building.as_str(),
                &row.capacity.to_string(),
                &row.peak.to_string(),
                &row.peak_pct.to_string(),
            ])
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "DAILY").unwrap();
    writeln!(output, "─────").unwrap();
    writeln!(
        output,
        "{}",
        day_line(["AREA", "DATE", "PEAK", "PEAK%", "USAGE", "USAGE%"])
    )
    .unwrap();
    for row in &report.areas {
        for day in &row.days {
            writeln!(
                output,
                "{}",
                day_line([
                    row.area.as_str(),
                    &day.date.to_string(),
                    &day.peak.to_string(),
                    &day.peak_pct.to_string(),
                    &format_minutes(day.usage_minutes),
                    &day.usage_pct.to_string(),
                ])
            )
            .unwrap();
        }
    }

    output
}

/// Runs the report command.
pub fn run<W: Write>(
    writer: &mut W,
    prepared: &Prepared,
    config: &Config,
    json: bool,
    use_cache: bool,
) -> Result<()> {
    let timeline = compute_timeline(prepared, config, use_cache)?;
    let report = build_report(
        &timeline,
        &prepared.registry,
        &prepared.batch.sessions,
        &config.report_config(),
    )
    .context("failed to assemble utilization report")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use insta::assert_snapshot;

    const DATASET: &str = r#"{
        "areas": [
            {"id": "LIB-1", "building": "LIB", "floor": "1", "capacity": 2},
            {"id": "LIB-2", "building": "LIB", "floor": "2", "capacity": 0},
            {"id": "SCI-1", "building": "SCI", "floor": "1", "capacity": 4}
        ],
        "sessions": [
            {"area": "LIB-1", "start": "2024-03-04 09:00", "duration_minutes": 30},
            {"area": "LIB-1", "start": "2024-03-04 09:15", "duration_minutes": 30},
            {"area": "LIB-2", "start": "2024-03-04 09:10", "duration_minutes": 0},
            {"area": "SCI-1", "start": "2024-03-04 09:40", "duration_minutes": 5}
        ]
    }"#;

    fn prepared(json: &str) -> Prepared {
        serde_json::from_str::<Dataset>(json)
            .unwrap()
            .prepare()
            .unwrap()
    }

    fn config() -> Config {
        Config {
            database_path: "/nonexistent/cache.db".into(),
            open_minutes_per_day: 60,
            cache_enabled: false,
            ..Config::default()
        }
    }

    fn render(json: &str) -> String {
        let mut output = Vec::new();
        run(&mut output, &prepared(json), &config(), false, false).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_report_tables() {
        let output = render(DATASET);
        assert_snapshot!(output, @r"
        LAB UTILIZATION: 2024-03-04 09:00 to 2024-03-04 09:44
        Open minutes per day: 60

        BY AREA
        ───────
        AREA      BUILDING  FLOOR   CAP  PEAK    PEAK%  SESSIONS     TIME
        LIB-1     LIB       1         2     2   100.0%         2    1h 0m
        LIB-2     LIB       2         0     0      n/a         1       0m
        SCI-1     SCI       1         4     1    25.0%         1       5m

        BY BUILDING
        ───────────
        BUILDING   CAP  PEAK    PEAK%
        LIB          2     2   100.0%
        SCI          4     1    25.0%

        DAILY
        ─────
        AREA      DATE        PEAK    PEAK%    USAGE   USAGE%
        LIB-1     2024-03-04     2   100.0%    1h 0m    50.0%
        LIB-2     2024-03-04     0      n/a       0m      n/a
        SCI-1     2024-03-04     1    25.0%       5m     2.1%
        ");
    }

    #[test]
    fn test_report_without_occupying_sessions() {
        let output = render(
            r#"{
                "areas": [{"id": "A", "building": "B", "floor": "1", "capacity": 2}],
                "sessions": [{"area": "A", "start": "2024-03-04 09:00", "duration_minutes": 0}]
            }"#,
        );
        assert_snapshot!(output, @r"
        LAB UTILIZATION

        No sessions occupy any minute.
        ");
    }

    #[test]
    fn test_report_json_marks_undefined_percentages() {
        let mut output = Vec::new();
        run(&mut output, &prepared(DATASET), &config(), true, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

        assert_eq!(value["open_minutes_per_day"], 60);
        assert_eq!(value["areas"][0]["area"], "LIB-1");
        assert_eq!(value["areas"][0]["peak"], 2);
        assert_eq!(value["areas"][0]["peak_pct"], 100.0);
        assert_eq!(value["areas"][1]["peak_pct"], "undefined");
        assert_eq!(value["buildings"][0]["building"], "LIB");
        assert_eq!(value["buildings"][0]["capacity"], 2);
    }
}
