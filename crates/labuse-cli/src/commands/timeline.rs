//! Timeline command: minute-by-minute concurrency of one area.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use labuse_core::{AreaId, Occupancy};
use serde::Serialize;

use crate::Config;
use crate::commands::util::compute_timeline;
use crate::dataset::Prepared;

/// Consecutive minutes sharing one count, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub count: u32,
}

/// Collapses a minute series into runs of equal count.
pub fn runs(occupancy: &impl Occupancy) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (minute, count) in occupancy.samples() {
        match runs.last_mut() {
            Some(run) if run.count == count => run.end = minute,
            _ => runs.push(Run {
                start: minute,
                end: minute,
                count,
            }),
        }
    }
    runs
}

/// Runs the timeline command.
pub fn run<W: Write>(
    writer: &mut W,
    prepared: &Prepared,
    config: &Config,
    area: &str,
    json: bool,
) -> Result<()> {
    let area = AreaId::new(area).context("invalid area")?;
    let Some(info) = prepared.registry.get(&area) else {
        bail!("unknown area {area}");
    };

    let timeline = compute_timeline(prepared, config, true)?;
    let area_runs = if timeline.is_empty() {
        Vec::new()
    } else {
        runs(timeline.area(&area)?)
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&area_runs)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "TIMELINE: {area} ({}, floor {}, capacity {})",
        info.building, info.floor, info.capacity
    )?;
    if area_runs.is_empty() {
        writeln!(writer, "No sessions occupy any minute.")?;
        return Ok(());
    }
    for run in &area_runs {
        writeln!(
            writer,
            "{} .. {}  {}",
            run.start.format("%Y-%m-%d %H:%M"),
            run.end.format("%Y-%m-%d %H:%M"),
            run.count
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use insta::assert_snapshot;

    fn prepared(sessions: &str) -> Prepared {
        let json = format!(
            r#"{{"areas": [
                    {{"id": "A", "building": "LIB", "floor": "1", "capacity": 2}},
                    {{"id": "B", "building": "LIB", "floor": "2", "capacity": 1}}
                ],
                "sessions": {sessions}}}"#
        );
        serde_json::from_str::<Dataset>(&json)
            .unwrap()
            .prepare()
            .unwrap()
    }

    fn config() -> Config {
        Config {
            database_path: "/nonexistent/cache.db".into(),
            open_minutes_per_day: 1440,
            cache_enabled: false,
            ..Config::default()
        }
    }

    const SESSIONS: &str = r#"[
        {"area": "A", "start": "2024-03-04 09:00", "duration_minutes": 5},
        {"area": "A", "start": "2024-03-04 09:03", "duration_minutes": 4},
        {"area": "B", "start": "2024-03-04 09:10", "duration_minutes": 2}
    ]"#;

    fn render(sessions: &str, area: &str) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, &prepared(sessions), &config(), area, false)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_timeline_runs_cover_shared_grid() {
        // Grid spans 09:00..=09:11 because of area B.
        let output = render(SESSIONS, "A").unwrap();
        assert_snapshot!(output, @r"
        TIMELINE: A (LIB, floor 1, capacity 2)
        2024-03-04 09:00 .. 2024-03-04 09:02  1
        2024-03-04 09:03 .. 2024-03-04 09:04  2
        2024-03-04 09:05 .. 2024-03-04 09:06  1
        2024-03-04 09:07 .. 2024-03-04 09:11  0
        ");
    }

    #[test]
    fn test_timeline_unknown_area() {
        let err = render(SESSIONS, "Z").unwrap_err();
        assert_eq!(err.to_string(), "unknown area Z");
    }

    #[test]
    fn test_timeline_without_occupying_sessions() {
        let output = render("[]", "B").unwrap();
        assert_snapshot!(output, @r"
        TIMELINE: B (LIB, floor 2, capacity 1)
        No sessions occupy any minute.
        ");
    }

    #[test]
    fn test_timeline_json_runs() {
        let mut output = Vec::new();
        run(&mut output, &prepared(SESSIONS), &config(), "B", true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

        let runs = value.as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["count"], 0);
        assert_eq!(runs[1]["start"], "2024-03-04T09:10:00");
        assert_eq!(runs[1]["end"], "2024-03-04T09:11:00");
        assert_eq!(runs[1]["count"], 1);
    }
}
