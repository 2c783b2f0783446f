//! Generators for synthetic result rows.
//!
//! These generators create predictable, verifiable rows that can be used
//! across the test suite.

use chrono::{DateTime, Duration, TimeZone, Utc};

use sos_protocol::codec::encode_rows;
use sos_protocol::{ResultRow, TextEncoding};

/// Midnight UTC on the given day.
///
/// # Panics
///
/// Panics on an invalid date.
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("invalid test date")
}

/// `count` single-value rows one hour apart starting at `start`.
///
/// Row `i` carries `base + i`, which makes rows easy to tell apart.
///
/// # Example
///
/// ```
/// use test_utils::{day, hourly_rows};
///
/// let rows = hourly_rows(day(2007, 5, 2), 3, 1.0);
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2].time, day(2007, 5, 2) + chrono::Duration::hours(2));
/// ```
pub fn hourly_rows(start: DateTime<Utc>, count: usize, base: f64) -> Vec<ResultRow> {
    (0..count)
        .map(|i| ResultRow::quantity(start + Duration::hours(i as i64), base + i as f64))
        .collect()
}

/// Rows from [`hourly_rows`] in the default text encoding.
///
/// # Example
///
/// ```
/// use test_utils::{day, hourly_values};
///
/// let values = hourly_values(day(2007, 5, 2), 2, 7.0);
/// assert_eq!(values, "2007-05-02T00:00:00.0,7@@2007-05-02T01:00:00.0,8@@");
/// ```
pub fn hourly_values(start: DateTime<Utc>, count: usize, base: f64) -> String {
    encode_rows(&hourly_rows(start, count, base), &TextEncoding::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_rows_are_increasing() {
        let rows = hourly_rows(day(2007, 5, 1), 24, 0.0);
        assert_eq!(rows.len(), 24);
        assert!(rows.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(rows[23].values.len(), 1);
    }

    #[test]
    fn test_hourly_values_trailing_separator() {
        let values = hourly_values(day(2007, 5, 1), 1, 6.56);
        assert_eq!(values, "2007-05-01T00:00:00.0,6.56@@");
    }

    #[test]
    fn test_empty() {
        assert!(hourly_rows(day(2007, 5, 1), 0, 0.0).is_empty());
        assert_eq!(hourly_values(day(2007, 5, 1), 0, 0.0), "");
    }
}
