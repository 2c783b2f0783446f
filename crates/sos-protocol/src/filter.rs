//! Temporal filter evaluation.
//!
//! Predicates over a sampling instant or period:
//!
//! | Filter         | Instant `t` matches when |
//! |----------------|--------------------------|
//! | `Before(x)`    | `t < x`                  |
//! | `After(x)`     | `t > x`                  |
//! | `During(b, e)` | `b <= t <= e`            |
//! | `Equals(x)`    | `t == x`                 |
//!
//! Several filters always combine with AND, each one evaluated on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sos_common::{SamplingTime, TimePeriod, TimePosition};

/// A temporal predicate on sampling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalFilter {
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    During(DateTime<Utc>, DateTime<Utc>),
    Equals(SamplingTime),
}

impl TemporalFilter {
    /// Operator name as advertised in the filter capabilities.
    pub fn operator(&self) -> &'static str {
        match self {
            TemporalFilter::Before(_) => "TM_Before",
            TemporalFilter::After(_) => "TM_After",
            TemporalFilter::During(..) => "TM_During",
            TemporalFilter::Equals(_) => "TM_Equals",
        }
    }

    /// Evaluate against a single instant.
    pub fn matches_instant(&self, t: &DateTime<Utc>) -> bool {
        match self {
            TemporalFilter::Before(x) => t < x,
            TemporalFilter::After(x) => t > x,
            TemporalFilter::During(b, e) => b <= t && t <= e,
            TemporalFilter::Equals(SamplingTime::Instant(x)) => t == x,
            TemporalFilter::Equals(SamplingTime::Period(_)) => false,
        }
    }

    /// Evaluate against an instant or a period.
    ///
    /// A period is before `x` when its known end is before `x`, after `x`
    /// when its known begin is after `x`, and during `[b, e]` when both known
    /// bounds lie inside. Indeterminate bounds never satisfy a comparison.
    pub fn matches(&self, time: &SamplingTime) -> bool {
        let period = match time {
            SamplingTime::Instant(t) => return self.matches_instant(t),
            SamplingTime::Period(p) => p,
        };

        match self {
            TemporalFilter::Before(x) => period.end.instant().is_some_and(|end| end < *x),
            TemporalFilter::After(x) => period.begin.instant().is_some_and(|begin| begin > *x),
            TemporalFilter::During(b, e) => {
                let begin_inside = period.begin.instant().is_some_and(|begin| begin >= *b);
                let end_inside = period.end.instant().is_some_and(|end| end <= *e);
                begin_inside && end_inside
            }
            TemporalFilter::Equals(other) => *other == SamplingTime::Period(*period),
        }
    }

    /// The sampling-time window this filter denotes.
    pub fn window(&self) -> SamplingTime {
        match self {
            TemporalFilter::Before(t) => {
                SamplingTime::Period(TimePeriod::new(TimePosition::Unknown, TimePosition::At(*t)))
            }
            TemporalFilter::After(t) => {
                SamplingTime::Period(TimePeriod::new(TimePosition::At(*t), TimePosition::Unknown))
            }
            TemporalFilter::During(b, e) => SamplingTime::Period(TimePeriod::bounded(*b, *e)),
            TemporalFilter::Equals(time) => *time,
        }
    }
}

/// True when every filter accepts the sampling time.
pub fn matches_all(filters: &[TemporalFilter], time: &SamplingTime) -> bool {
    filters.iter().all(|f| f.matches(time))
}

/// True when every filter accepts the instant.
pub fn matches_all_instant(filters: &[TemporalFilter], t: &DateTime<Utc>) -> bool {
    filters.iter().all(|f| f.matches_instant(t))
}

/// Window of a template created with the given filters.
///
/// Without filters the window runs from `sentinel_start` to "now". Several
/// filters intersect: the latest known begin and the earliest known end win,
/// and an instant window takes precedence over any period.
pub fn template_window(filters: &[TemporalFilter], sentinel_start: DateTime<Utc>) -> SamplingTime {
    if filters.is_empty() {
        return SamplingTime::Period(TimePeriod::new(
            TimePosition::At(sentinel_start),
            TimePosition::Now,
        ));
    }

    let windows: Vec<SamplingTime> = filters.iter().map(TemporalFilter::window).collect();
    if let Some(instant) = windows
        .iter()
        .find(|w| matches!(w, SamplingTime::Instant(_)))
    {
        return *instant;
    }

    let begin = windows.iter().filter_map(SamplingTime::begin).max();
    let end = windows.iter().filter_map(SamplingTime::end).min();
    SamplingTime::Period(TimePeriod::new(
        begin.map_or(TimePosition::Unknown, TimePosition::At),
        end.map_or(TimePosition::Unknown, TimePosition::At),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2007, 5, 1, h, m, 0).unwrap()
    }

    fn rows() -> Vec<DateTime<Utc>> {
        vec![t(2, 59), t(3, 59), t(4, 59), t(5, 59), t(6, 59)]
    }

    fn select(filters: &[TemporalFilter]) -> Vec<DateTime<Utc>> {
        rows()
            .into_iter()
            .filter(|r| matches_all_instant(filters, r))
            .collect()
    }

    #[test]
    fn test_before_is_strict() {
        assert_eq!(
            select(&[TemporalFilter::Before(t(5, 0))]),
            vec![t(2, 59), t(3, 59), t(4, 59)]
        );
        assert!(!TemporalFilter::Before(t(4, 59)).matches_instant(&t(4, 59)));
    }

    #[test]
    fn test_after_is_strict() {
        assert_eq!(
            select(&[TemporalFilter::After(t(4, 59))]),
            vec![t(5, 59), t(6, 59)]
        );
    }

    #[test]
    fn test_during_is_inclusive() {
        assert_eq!(
            select(&[TemporalFilter::During(t(3, 59), t(5, 59))]),
            vec![t(3, 59), t(4, 59), t(5, 59)]
        );
    }

    #[test]
    fn test_equals_instant_exact() {
        let filter = TemporalFilter::Equals(SamplingTime::Instant(t(4, 59)));
        assert_eq!(select(&[filter]), vec![t(4, 59)]);
        let off_by_a_second = TemporalFilter::Equals(SamplingTime::Instant(
            t(4, 59) + chrono::Duration::seconds(1),
        ));
        assert!(select(&[off_by_a_second]).is_empty());
    }

    #[test]
    fn test_composition_is_intersection() {
        let filters = [TemporalFilter::Before(t(5, 0)), TemporalFilter::After(t(3, 0))];
        assert_eq!(select(&filters), vec![t(3, 59), t(4, 59)]);
    }

    #[test]
    fn test_disjoint_composition_is_empty() {
        let filters = [TemporalFilter::Before(t(3, 0)), TemporalFilter::After(t(6, 0))];
        assert!(select(&filters).is_empty());
    }

    #[test]
    fn test_period_operands() {
        let period = SamplingTime::Period(TimePeriod::bounded(t(3, 0), t(4, 0)));
        assert!(TemporalFilter::Before(t(4, 1)).matches(&period));
        assert!(!TemporalFilter::Before(t(4, 0)).matches(&period));
        assert!(TemporalFilter::After(t(2, 59)).matches(&period));
        assert!(TemporalFilter::During(t(3, 0), t(4, 0)).matches(&period));
        assert!(!TemporalFilter::During(t(3, 1), t(4, 0)).matches(&period));
        assert!(TemporalFilter::Equals(period).matches(&period));

        let open = SamplingTime::Period(TimePeriod::new(TimePosition::Unknown, TimePosition::At(t(4, 0))));
        assert!(!TemporalFilter::After(t(1, 0)).matches(&open));
    }

    #[test]
    fn test_window_without_filters() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            template_window(&[], epoch),
            SamplingTime::Period(TimePeriod::new(TimePosition::At(epoch), TimePosition::Now))
        );
    }

    #[test]
    fn test_window_per_filter() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            template_window(&[TemporalFilter::Before(t(5, 0))], epoch),
            SamplingTime::Period(TimePeriod::new(TimePosition::Unknown, TimePosition::At(t(5, 0))))
        );
        assert_eq!(
            template_window(&[TemporalFilter::After(t(3, 0))], epoch),
            SamplingTime::Period(TimePeriod::new(TimePosition::At(t(3, 0)), TimePosition::Unknown))
        );
        assert_eq!(
            template_window(&[TemporalFilter::During(t(3, 0), t(5, 0))], epoch),
            SamplingTime::Period(TimePeriod::bounded(t(3, 0), t(5, 0)))
        );
        assert_eq!(
            template_window(&[TemporalFilter::Equals(SamplingTime::Instant(t(4, 59)))], epoch),
            SamplingTime::Instant(t(4, 59))
        );
    }

    #[test]
    fn test_window_intersection() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let window = template_window(
            &[TemporalFilter::Before(t(5, 0)), TemporalFilter::After(t(3, 0))],
            epoch,
        );
        assert_eq!(window, SamplingTime::Period(TimePeriod::bounded(t(3, 0), t(5, 0))));
    }
}
