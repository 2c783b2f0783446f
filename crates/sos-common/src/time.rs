//! Time primitives for observation sampling times.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339 (`2007-05-01T02:59:00Z`), naive date-times with optional
/// fractional seconds (`2007-05-01T02:59:00.0`, assumed UTC) and plain dates.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Without timezone (assume UTC), fractional seconds optional
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Format a timestamp the way result blocks carry them: `2007-05-01T02:59:00.0`.
///
/// Whole seconds get a single fractional digit, anything finer is written
/// with millisecond precision.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    let millis = dt.timestamp_subsec_millis();
    if millis == 0 {
        format!("{}.0", dt.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        format!("{}.{:03}", dt.format("%Y-%m-%dT%H:%M:%S"), millis)
    }
}

/// A bound of a time period: a known instant or an indeterminate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimePosition {
    At(DateTime<Utc>),
    /// Open bound.
    Unknown,
    /// The moment the period is evaluated.
    Now,
}

impl TimePosition {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            TimePosition::At(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for TimePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePosition::At(dt) => f.write_str(&dt.to_rfc3339()),
            TimePosition::Unknown => f.write_str("unknown"),
            TimePosition::Now => f.write_str("now"),
        }
    }
}

impl From<TimePosition> for String {
    fn from(position: TimePosition) -> Self {
        position.to_string()
    }
}

impl TryFrom<String> for TimePosition {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "unknown" | ".." => Ok(TimePosition::Unknown),
            "now" => Ok(TimePosition::Now),
            other => parse_timestamp(other).map(TimePosition::At),
        }
    }
}

/// A time period with possibly indeterminate bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    pub begin: TimePosition,
    pub end: TimePosition,
}

impl TimePeriod {
    pub fn new(begin: TimePosition, end: TimePosition) -> Self {
        Self { begin, end }
    }

    /// Period with two known bounds.
    pub fn bounded(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(TimePosition::At(begin), TimePosition::At(end))
    }

    /// Inclusive containment; indeterminate bounds are open.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        let after_begin = self.begin.instant().map_or(true, |b| *dt >= b);
        let before_end = self.end.instant().map_or(true, |e| *dt <= e);
        after_begin && before_end
    }
}

/// Instant or period at which an observation is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SamplingTime {
    Instant(DateTime<Utc>),
    Period(TimePeriod),
}

impl SamplingTime {
    /// Smallest sampling time covering all given instants.
    ///
    /// A single distinct instant collapses to `Instant`.
    pub fn span<I>(times: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut iter = times.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), t| (min.min(t), max.max(t)));
        if min == max {
            Some(SamplingTime::Instant(min))
        } else {
            Some(SamplingTime::Period(TimePeriod::bounded(min, max)))
        }
    }

    /// Parse a KVP time value: `instant` or `begin/end`.
    pub fn parse_kvp(s: &str) -> Result<Self, TimeParseError> {
        match s.split_once('/') {
            Some((begin, end)) => {
                let begin = TimePosition::try_from(begin.to_string())?;
                let end = TimePosition::try_from(end.to_string())?;
                Ok(SamplingTime::Period(TimePeriod::new(begin, end)))
            }
            None => parse_timestamp(s).map(SamplingTime::Instant),
        }
    }

    /// Earliest known instant.
    pub fn begin(&self) -> Option<DateTime<Utc>> {
        match self {
            SamplingTime::Instant(dt) => Some(*dt),
            SamplingTime::Period(p) => p.begin.instant(),
        }
    }

    /// Latest known instant.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            SamplingTime::Instant(dt) => Some(*dt),
            SamplingTime::Period(p) => p.end.instant(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}
