//! Read-only queries over a finished timeline.
//!
//! Nothing here looks at raw sessions again except [`session_stats`], which
//! summarizes the accepted records themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::OccupancyError;
use crate::registry::AreaRegistry;
use crate::session::Session;
use crate::timeline::{AreaTimeline, MinuteGrid, Occupancy, Timeline};
use crate::types::{AreaId, BuildingId};

/// Highest count anywhere on the grid.
pub fn peak(occupancy: &impl Occupancy) -> u32 {
    occupancy.counts().iter().copied().max().unwrap_or(0)
}

/// Count at a given minute, if it lies on the grid.
pub fn count_at(occupancy: &impl Occupancy, minute: NaiveDateTime) -> Option<u32> {
    let offset = occupancy.grid().offset_of(minute)?;
    occupancy.counts().get(offset).copied()
}

/// Maximum concurrency for one area over the whole grid.
pub fn overall_max(timeline: &Timeline, area: &AreaId) -> Result<u32, OccupancyError> {
    timeline.area(area).map(peak)
}

/// Maximum count within each partition of the grid.
///
/// `partition` maps a minute to its bucket, e.g. its calendar date, its ISO
/// week, or an exam-week flag. Buckets with no minutes on the grid are absent.
pub fn partitioned_max<K, F>(occupancy: &impl Occupancy, partition: F) -> BTreeMap<K, u32>
where
    K: Ord,
    F: Fn(NaiveDateTime) -> K,
{
    max_by_partition(occupancy.samples(), partition)
}

/// [`partitioned_max`] over the minutes of `observed` dates only.
///
/// Dates on which no area of the run saw a session (a closed library) do not
/// produce zero-valued buckets.
pub fn observed_partitioned_max<K, F>(
    occupancy: &impl Occupancy,
    observed: &BTreeSet<NaiveDate>,
    partition: F,
) -> BTreeMap<K, u32>
where
    K: Ord,
    F: Fn(NaiveDateTime) -> K,
{
    max_by_partition(
        occupancy
            .samples()
            .filter(|(minute, _)| observed.contains(&minute.date())),
        partition,
    )
}

fn max_by_partition<K, F>(
    samples: impl Iterator<Item = (NaiveDateTime, u32)>,
    partition: F,
) -> BTreeMap<K, u32>
where
    K: Ord,
    F: Fn(NaiveDateTime) -> K,
{
    let mut maxima = BTreeMap::new();
    for (minute, count) in samples {
        let slot = maxima.entry(partition(minute)).or_insert(0);
        *slot = (*slot).max(count);
    }
    maxima
}

/// Maximum count per observed calendar date.
pub fn daily_peaks(
    occupancy: &impl Occupancy,
    observed: &BTreeSet<NaiveDate>,
) -> BTreeMap<NaiveDate, u32> {
    observed_partitioned_max(occupancy, observed, |minute| minute.date())
}

/// Maximum concurrency per calendar date for one area.
///
/// Only dates with at least one session anywhere in the run are present. A
/// date the area sat idle while other areas were in use reads as zero.
pub fn daily_max(
    timeline: &Timeline,
    area: &AreaId,
) -> Result<BTreeMap<NaiveDate, u32>, OccupancyError> {
    let area_timeline = timeline.area(area)?;
    Ok(daily_peaks(area_timeline, timeline.observed_dates()))
}

/// Occupied computer-minutes per observed calendar date.
pub fn daily_usage_minutes(
    occupancy: &impl Occupancy,
    observed: &BTreeSet<NaiveDate>,
) -> BTreeMap<NaiveDate, u64> {
    let mut usage: BTreeMap<NaiveDate, u64> = observed.iter().map(|&d| (d, 0)).collect();
    for (minute, count) in occupancy.samples() {
        if let Some(total) = usage.get_mut(&minute.date()) {
            *total += u64::from(count);
        }
    }
    usage
}

/// What a count is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentageBasis {
    /// Concurrent sessions at one instant, against the computer count.
    Instantaneous,
    /// Computer-minutes in one day, against capacity times opening minutes.
    Daily { open_minutes_per_day: u32 },
}

/// A share of capacity in percent.
///
/// `Undefined` marks a zero denominator. It serializes as the string
/// `"undefined"` and is never coerced to zero or infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    Undefined,
}

impl Percentage {
    /// `count` as a percentage of `capacity` under `basis`.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(count: u64, capacity: u64, basis: PercentageBasis) -> Self {
        let denominator = match basis {
            PercentageBasis::Instantaneous => capacity as f64,
            PercentageBasis::Daily {
                open_minutes_per_day,
            } => capacity as f64 * f64::from(open_minutes_per_day),
        };
        if denominator == 0.0 {
            Self::Undefined
        } else {
            Self::Value(count as f64 * 100.0 / denominator)
        }
    }

    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.1}%"),
            Self::Undefined => f.write_str("n/a"),
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// `count` as a percentage of a registered area's capacity.
pub fn percentage_of_capacity(
    registry: &AreaRegistry,
    area: &AreaId,
    count: u64,
    basis: PercentageBasis,
) -> Result<Percentage, OccupancyError> {
    let capacity = registry.capacity_of(area)?;
    Ok(Percentage::of(count, u64::from(capacity), basis))
}

/// Summed concurrency of all areas in a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildingTimeline {
    pub building: BuildingId,
    /// Sum of member area capacities.
    pub capacity: u64,
    pub grid: MinuteGrid,
    pub counts: Vec<u32>,
}

impl Occupancy for BuildingTimeline {
    fn grid(&self) -> &MinuteGrid {
        &self.grid
    }

    fn counts(&self) -> &[u32] {
        &self.counts
    }
}

/// Sums member area timelines minute by minute.
///
/// # Errors
///
/// `InconsistentGrid` if any member's grid differs from the first member's.
/// `NoData` if there are no members.
pub fn rollup_areas(
    building: &BuildingId,
    members: &[&AreaTimeline],
    capacity: u64,
) -> Result<BuildingTimeline, OccupancyError> {
    let Some(first) = members.first() else {
        return Err(OccupancyError::NoData);
    };
    let grid = first.grid;

    let mut counts = vec![0_u32; grid.len()];
    for member in members {
        if member.grid != grid || member.counts.len() != grid.len() {
            return Err(OccupancyError::InconsistentGrid {
                building: building.clone(),
                area: member.area.clone(),
            });
        }
        for (total, &count) in counts.iter_mut().zip(&member.counts) {
            *total = total
                .checked_add(count)
                .ok_or_else(|| OccupancyError::CountOverflow {
                    area: member.area.clone(),
                })?;
        }
    }

    Ok(BuildingTimeline {
        building: building.clone(),
        capacity,
        grid,
        counts,
    })
}

/// Rolls every registered building up from its areas.
pub fn building_rollup(
    timeline: &Timeline,
    registry: &AreaRegistry,
) -> Result<BTreeMap<BuildingId, BuildingTimeline>, OccupancyError> {
    if timeline.is_empty() {
        return Err(OccupancyError::NoData);
    }

    registry
        .buildings()
        .into_iter()
        .map(|building| -> Result<_, OccupancyError> {
            let members = registry
                .areas_in_building(building)
                .map(|a| timeline.area(&a.id))
                .collect::<Result<Vec<_>, _>>()?;
            let rolled = rollup_areas(building, &members, registry.building_capacity(building))?;
            Ok((building.clone(), rolled))
        })
        .collect()
}

/// Session counts and durations for one area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Accepted sessions, including zero-duration ones.
    pub sessions: usize,
    pub zero_duration: usize,
    pub total_minutes: u64,
}

impl SessionStats {
    /// Mean session length in minutes.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_minutes(&self) -> Option<f64> {
        (self.sessions > 0).then(|| self.total_minutes as f64 / self.sessions as f64)
    }
}

/// Per-area session counts and total minutes.
pub fn session_stats(sessions: &[Session]) -> BTreeMap<AreaId, SessionStats> {
    let mut stats: BTreeMap<AreaId, SessionStats> = BTreeMap::new();
    for session in sessions {
        let entry = stats.entry(session.area().clone()).or_default();
        entry.sessions += 1;
        entry.total_minutes += u64::from(session.duration_minutes());
        if !session.occupies_timeline() {
            entry.zero_duration += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Area;
    use crate::timeline::{build_timeline, build_timeline_on_grid};
    use chrono::{Datelike, Duration};

    fn ts(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn id(s: &str) -> AreaId {
        AreaId::new(s).unwrap()
    }

    fn building(s: &str) -> BuildingId {
        BuildingId::new(s).unwrap()
    }

    fn registry() -> AreaRegistry {
        let area = |name: &str, b: &str, capacity| Area {
            id: id(name),
            building: building(b),
            floor: "1".to_string(),
            capacity,
        };
        AreaRegistry::new([
            area("A", "LIB", 2),
            area("B", "LIB", 3),
            area("C", "SCI", 4),
            area("Z0", "SCI", 0),
        ])
        .unwrap()
    }

    fn session(area: &str, start: i64, duration: u32) -> Session {
        Session::new(id(area), ts(start), duration)
    }

    fn pct(p: Percentage) -> f64 {
        p.value().expect("defined percentage")
    }

    #[test]
    fn overlapping_sessions_scenario() {
        let reg = registry();
        let timeline = build_timeline(&[session("A", 0, 30), session("A", 15, 30)], &reg).unwrap();
        let a = timeline.area(&id("A")).unwrap();

        assert_eq!(overall_max(&timeline, &id("A")), Ok(2));
        assert_eq!(count_at(a, ts(14)), Some(1));
        assert_eq!(count_at(a, ts(20)), Some(2));
        assert_eq!(count_at(a, ts(44)), Some(1));
        assert_eq!(count_at(a, ts(45)), None);

        let at_0920 = count_at(a, ts(20)).unwrap();
        let p = percentage_of_capacity(
            &reg,
            &id("A"),
            u64::from(at_0920),
            PercentageBasis::Instantaneous,
        )
        .unwrap();
        assert!((pct(p) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn queries_on_empty_timeline_report_no_data() {
        let reg = registry();
        let timeline = build_timeline(&[session("A", 0, 0)], &reg).unwrap();

        assert_eq!(overall_max(&timeline, &id("A")), Err(OccupancyError::NoData));
        assert_eq!(daily_max(&timeline, &id("A")), Err(OccupancyError::NoData));
        assert_eq!(building_rollup(&timeline, &reg), Err(OccupancyError::NoData));
    }

    #[test]
    fn overall_max_of_unknown_area() {
        let reg = registry();
        let timeline = build_timeline(&[session("A", 0, 5)], &reg).unwrap();
        assert!(matches!(
            overall_max(&timeline, &id("nope")),
            Err(OccupancyError::UnknownArea { .. })
        ));
    }

    #[test]
    fn daily_max_partitions_by_date_and_skips_closed_days() {
        let reg = registry();
        let day = 24 * 60;
        let sessions = vec![
            session("A", 0, 60),
            session("A", 30, 60),
            // 03-05 has no session anywhere: the library was closed
            session("A", 2 * day, 10),
        ];
        let timeline = build_timeline(&sessions, &reg).unwrap();

        let daily = daily_max(&timeline, &id("A")).unwrap();
        let days: Vec<_> = daily.iter().map(|(d, m)| (d.day(), *m)).collect();
        assert_eq!(days, [(4, 2), (6, 1)]);
        assert!(!daily.contains_key(&NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()));

        // Outside the grid entirely: absent as well
        assert!(!daily.contains_key(&NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()));
    }

    #[test]
    fn daily_max_reports_idle_area_on_open_day_as_zero() {
        let reg = registry();
        let timeline = build_timeline(&[session("A", 0, 10), session("A", 2 * 24 * 60, 10)], &reg)
            .unwrap();

        let daily = daily_max(&timeline, &id("B")).unwrap();
        let days: Vec<_> = daily.iter().map(|(d, m)| (d.day(), *m)).collect();
        assert_eq!(days, [(4, 0), (6, 0)]);
    }

    #[test]
    fn observed_partitioned_max_drops_closed_days_from_weeks() {
        let reg = registry();
        let day = 24 * 60;
        let timeline = build_timeline(&[session("A", 0, 10), session("A", 2 * day, 10)], &reg)
            .unwrap();
        let a = timeline.area(&id("A")).unwrap();

        let all = partitioned_max(a, |m| m.date());
        let observed = observed_partitioned_max(a, timeline.observed_dates(), |m| m.date());
        assert_eq!(all.len(), 3);
        assert_eq!(observed.len(), 2);
    }

    #[test]
    fn daily_max_never_exceeds_overall_max() {
        let reg = registry();
        let sessions: Vec<_> = (0..50)
            .map(|i| session(["A", "B"][i % 2], i64::try_from(i).unwrap() * 97, 200))
            .collect();
        let timeline = build_timeline(&sessions, &reg).unwrap();

        for area in ["A", "B", "C"] {
            let overall = overall_max(&timeline, &id(area)).unwrap();
            let daily = daily_max(&timeline, &id(area)).unwrap();
            assert!(daily.values().all(|&m| m <= overall), "area {area}");
            assert_eq!(daily.values().copied().max().unwrap_or(0), overall);
        }
    }

    #[test]
    fn partitioned_max_with_custom_calendar() {
        let reg = registry();
        let sessions = vec![session("A", 0, 10), session("A", 5, 10), session("A", 60, 10)];
        let timeline = build_timeline(&sessions, &reg).unwrap();
        let a = timeline.area(&id("A")).unwrap();

        let by_half_hour = partitioned_max(a, |m| m >= ts(30));
        assert_eq!(by_half_hour.get(&false), Some(&2));
        assert_eq!(by_half_hour.get(&true), Some(&1));
    }

    #[test]
    fn daily_usage_sums_computer_minutes() {
        let reg = registry();
        let timeline = build_timeline(&[session("A", 0, 30), session("A", 15, 30)], &reg).unwrap();
        let usage = daily_usage_minutes(timeline.area(&id("A")).unwrap(), timeline.observed_dates());
        assert_eq!(usage.values().copied().collect::<Vec<_>>(), [60]);
    }

    #[test]
    fn percentage_is_monotonic_in_count() {
        let basis = PercentageBasis::Daily {
            open_minutes_per_day: 600,
        };
        let mut previous = f64::NEG_INFINITY;
        for count in (0..=20_000).step_by(250) {
            let p = pct(Percentage::of(count, 12, basis));
            assert!(p >= previous);
            previous = p;
        }
    }

    #[test]
    fn daily_percentage_is_exactly_100_at_full_use() {
        let basis = PercentageBasis::Daily {
            open_minutes_per_day: 840,
        };
        let p = Percentage::of(12 * 840, 12, basis);
        assert_eq!(p, Percentage::Value(100.0));
    }

    #[test]
    fn zero_capacity_is_undefined() {
        let reg = registry();
        let p = percentage_of_capacity(&reg, &id("Z0"), 3, PercentageBasis::Instantaneous).unwrap();
        assert_eq!(p, Percentage::Undefined);
        assert_eq!(p.to_string(), "n/a");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"undefined\"");

        let closed = PercentageBasis::Daily {
            open_minutes_per_day: 0,
        };
        assert_eq!(Percentage::of(3, 10, closed), Percentage::Undefined);
    }

    #[test]
    fn percentage_of_unknown_area_is_error() {
        let reg = registry();
        let result = percentage_of_capacity(&reg, &id("Q"), 1, PercentageBasis::Instantaneous);
        assert!(matches!(result, Err(OccupancyError::UnknownArea { .. })));
    }

    #[test]
    fn building_rollup_is_additive() {
        let reg = registry();
        let sessions = vec![
            session("A", 0, 30),
            session("A", 10, 5),
            session("B", 5, 40),
            session("C", 20, 20),
        ];
        let timeline = build_timeline(&sessions, &reg).unwrap();
        let buildings = building_rollup(&timeline, &reg).unwrap();

        let lib = &buildings[&building("LIB")];
        assert_eq!(lib.capacity, 5);
        let a = timeline.area(&id("A")).unwrap();
        let b = timeline.area(&id("B")).unwrap();
        for (i, total) in lib.counts.iter().enumerate() {
            assert_eq!(*total, a.counts[i] + b.counts[i], "minute {i}");
        }

        let sci = &buildings[&building("SCI")];
        assert_eq!(sci.capacity, 4);
        assert_eq!(peak(sci), 1);
    }

    #[test]
    fn rollup_rejects_mismatched_grids() {
        let reg = registry();
        let sessions = vec![session("A", 0, 30), session("B", 5, 10)];
        let shifted = MinuteGrid::new(ts(1), ts(29)).unwrap();

        let full = build_timeline(&sessions, &reg).unwrap();
        let other = build_timeline_on_grid(&sessions, &reg, shifted).unwrap();

        let a = full.area(&id("A")).unwrap();
        let b = other.area(&id("B")).unwrap();
        let err = rollup_areas(&building("LIB"), &[a, b], 5).unwrap_err();
        assert_eq!(
            err,
            OccupancyError::InconsistentGrid {
                building: building("LIB"),
                area: id("B"),
            }
        );
    }

    #[test]
    fn session_stats_count_zero_duration_sessions() {
        let sessions = vec![session("A", 0, 30), session("A", 5, 0), session("B", 0, 10)];
        let stats = session_stats(&sessions);

        let a = stats[&id("A")];
        assert_eq!(a.sessions, 2);
        assert_eq!(a.zero_duration, 1);
        assert_eq!(a.total_minutes, 30);
        assert_eq!(a.mean_minutes(), Some(15.0));
        assert_eq!(stats[&id("B")].zero_duration, 0);
    }
}
