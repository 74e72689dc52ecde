//! Lab login sessions: raw records and their validated form.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::AreaId;

/// Timestamp layouts accepted besides RFC 3339, most specific first.
const START_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Why a raw record was excluded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    /// The classifier did not resolve an area for the record.
    #[error("area is missing or empty")]
    MissingArea,

    /// The area field held something other than text.
    #[error("area must be text, got {value}")]
    InvalidArea { value: String },

    /// Durations count minutes occupied and cannot be negative.
    #[error("duration must not be negative, got {value}")]
    NegativeDuration { value: i64 },

    /// The duration is not a whole number (a fraction, text, or absent).
    #[error("duration must be a whole number of minutes, got {value}")]
    InvalidDuration { value: String },

    /// The duration does not fit the minute counter.
    #[error("duration {value} is out of range")]
    DurationOutOfRange { value: i64 },

    /// The start timestamp could not be parsed to minute precision.
    #[error("unparseable start time: {value:?}")]
    InvalidStart { value: String },
}

/// A record that failed normalization, with its position in the input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("record #{index}: {reason}")]
pub struct RejectedRecord {
    pub index: usize,
    #[source]
    pub reason: MalformedRecord,
}

/// A session row as handed over by the ingestion layer.
///
/// Fields are kept as untyped JSON so one badly typed row is rejected on its
/// own by [`normalize`] instead of failing the whole file. Absent fields read
/// as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    /// Area label resolved by the classifier, if any.
    #[serde(default)]
    pub area: Value,
    /// Login time as text.
    #[serde(default)]
    pub start: Value,
    /// Minutes logged in.
    #[serde(default)]
    pub duration_minutes: Value,
}

/// One validated logged-in period.
///
/// `start` is always truncated to the minute. A session covers the minutes
/// `start ..= end()`; a zero-duration session covers none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    area: AreaId,
    start: NaiveDateTime,
    duration_minutes: u32,
}

impl Session {
    /// Creates a session, discarding seconds from `start`.
    pub fn new(area: AreaId, start: NaiveDateTime, duration_minutes: u32) -> Self {
        Self {
            area,
            start: truncate_to_minute(start),
            duration_minutes,
        }
    }

    pub const fn area(&self) -> &AreaId {
        &self.area
    }

    pub const fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub const fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Last minute the session occupies (inclusive).
    ///
    /// Returns `None` for zero-duration sessions, which occupy no minute.
    pub fn end(&self) -> Option<NaiveDateTime> {
        let last = i64::from(self.duration_minutes.checked_sub(1)?);
        Some(self.start + Duration::minutes(last))
    }

    /// Whether the session contributes to the occupancy timeline.
    pub const fn occupies_timeline(&self) -> bool {
        self.duration_minutes > 0
    }
}

/// Validates a raw record.
///
/// `index` is the record's position in the input and is carried into the
/// rejection for diagnostics.
pub fn normalize(index: usize, raw: &RawSession) -> Result<Session, RejectedRecord> {
    let reject = |reason| RejectedRecord { index, reason };

    let area = match &raw.area {
        Value::String(label) => {
            AreaId::new(label.as_str()).map_err(|_| reject(MalformedRecord::MissingArea))?
        }
        Value::Null => return Err(reject(MalformedRecord::MissingArea)),
        other => {
            return Err(reject(MalformedRecord::InvalidArea {
                value: other.to_string(),
            }));
        }
    };

    let duration = parse_duration(&raw.duration_minutes).map_err(reject)?;

    let start = match &raw.start {
        Value::String(text) => parse_start(text).ok_or_else(|| text.clone()),
        other => Err(other.to_string()),
    }
    .map_err(|value| reject(MalformedRecord::InvalidStart { value }))?;

    Ok(Session::new(area, start, duration))
}

/// Outcome of normalizing a whole input set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Accepted sessions, in input order. Includes zero-duration sessions.
    pub sessions: Vec<Session>,
    /// Excluded records, in input order.
    pub rejected: Vec<RejectedRecord>,
}

impl NormalizedBatch {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    /// Number of accepted sessions with zero duration.
    pub fn zero_duration_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| !s.occupies_timeline())
            .count()
    }
}

/// Normalizes every record, collecting rejections instead of stopping.
pub fn normalize_all(raws: &[RawSession]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        sessions: Vec::with_capacity(raws.len()),
        rejected: Vec::new(),
    };

    for (index, raw) in raws.iter().enumerate() {
        match normalize(index, raw) {
            Ok(session) => batch.sessions.push(session),
            Err(rejected) => {
                tracing::warn!(index, reason = %rejected.reason, "rejecting malformed session record");
                batch.rejected.push(rejected);
            }
        }
    }

    tracing::debug!(
        accepted = batch.sessions.len(),
        rejected = batch.rejected.len(),
        zero_duration = batch.zero_duration_count(),
        "normalized session records"
    );

    batch
}

/// Reads a duration as whole minutes that fit the minute counter.
fn parse_duration(value: &Value) -> Result<u32, MalformedRecord> {
    let Some(minutes) = value.as_i64() else {
        return Err(MalformedRecord::InvalidDuration {
            value: value.to_string(),
        });
    };
    if minutes < 0 {
        return Err(MalformedRecord::NegativeDuration { value: minutes });
    }
    u32::try_from(minutes).map_err(|_| MalformedRecord::DurationOutOfRange { value: minutes })
}

/// Parses a login timestamp, keeping wall-clock time for offset-qualified input.
fn parse_start(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    START_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub(crate) fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
