//! Time intervals and the partitioner that splits a sync range into buckets.
//!
//! Buckets are the unit of download and of state advancement: a crash loses
//! at most one bucket of work per camera.

use std::fmt;

use chrono::{Duration, NaiveDateTime, Timelike};

/// Reference point for bucket alignment (`1970-01-01T00:00:00`).
///
/// Also the implicit high-water mark of a camera that has no recorded state.
pub fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Zero minutes, seconds and sub-seconds.
pub fn truncate_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(t.hour(), 0, 0).unwrap_or(t)
}

/// Half-open `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {})",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// Splits a range into buckets whose boundaries sit on multiples of the
/// bucket length counted from [`epoch`].
///
/// With the default 24 hour bucket every boundary is a midnight, so a run
/// resumed from any hour lands on the same boundaries as a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    bucket: Duration,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self {
            bucket: Duration::hours(24),
        }
    }
}

impl Partitioner {
    /// Partitioner with buckets of `hours` hours. Zero is clamped to one hour.
    pub fn with_bucket_hours(hours: u32) -> Self {
        Self {
            bucket: Duration::hours(i64::from(hours.max(1))),
        }
    }

    pub fn bucket(&self) -> Duration {
        self.bucket
    }

    /// Ordered, contiguous, non-overlapping buckets covering `[start, end)`.
    ///
    /// Empty iff `start >= end`. The first bucket starts at `start` and the
    /// last one ends at `end`; inner boundaries are bucket-aligned.
    pub fn partition(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Interval> {
        let mut buckets = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let next = self.next_boundary(cursor).map_or(end, |b| b.min(end));
            buckets.push(Interval::new(cursor, next));
            cursor = next;
        }
        buckets
    }

    /// First aligned boundary strictly after `t`, or `None` past the
    /// representable calendar.
    fn next_boundary(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let bucket_secs = self.bucket.num_seconds();
        let offset = (t - epoch()).num_seconds().rem_euclid(bucket_secs);
        t.checked_add_signed(Duration::seconds(bucket_secs - offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn assert_covers(buckets: &[Interval], start: NaiveDateTime, end: NaiveDateTime) {
        assert_eq!(buckets.first().unwrap().start, start);
        assert_eq!(buckets.last().unwrap().end, end);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap in {:?}", pair);
        }
        assert!(buckets.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_truncate_to_hour() {
        assert_eq!(
            truncate_to_hour(dt("2024-01-03T05:17:42")),
            dt("2024-01-03T05:00:00")
        );
        let with_nanos = dt("2024-01-03T05:17:42") + Duration::nanoseconds(123_456);
        assert_eq!(truncate_to_hour(with_nanos), dt("2024-01-03T05:00:00"));
        assert_eq!(
            truncate_to_hour(dt("2024-01-03T05:00:00")),
            dt("2024-01-03T05:00:00")
        );
    }

    #[test]
    fn test_epoch() {
        assert_eq!(epoch(), dt("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_empty_range_yields_no_buckets() {
        let p = Partitioner::default();
        let t = dt("2024-01-01T00:00:00");
        assert!(p.partition(t, t).is_empty());
        assert!(p.partition(t, t - Duration::hours(3)).is_empty());
    }

    #[test]
    fn test_daily_buckets_align_to_midnight() {
        let p = Partitioner::default();
        let start = dt("2024-01-01T00:00:00");
        let end = dt("2024-01-03T05:00:00");
        let buckets = p.partition(start, end);
        assert_eq!(
            buckets,
            vec![
                Interval::new(dt("2024-01-01T00:00:00"), dt("2024-01-02T00:00:00")),
                Interval::new(dt("2024-01-02T00:00:00"), dt("2024-01-03T00:00:00")),
                Interval::new(dt("2024-01-03T00:00:00"), dt("2024-01-03T05:00:00")),
            ]
        );
    }

    #[test]
    fn test_unaligned_start_gets_short_first_bucket() {
        let p = Partitioner::default();
        let start = dt("2024-01-01T13:00:00");
        let end = dt("2024-01-02T10:00:00");
        let buckets = p.partition(start, end);
        assert_eq!(
            buckets,
            vec![
                Interval::new(start, dt("2024-01-02T00:00:00")),
                Interval::new(dt("2024-01-02T00:00:00"), end),
            ]
        );
    }

    #[test]
    fn test_range_inside_single_bucket() {
        let p = Partitioner::default();
        let start = dt("2024-05-05T02:00:00");
        let end = dt("2024-05-05T03:00:00");
        assert_eq!(p.partition(start, end), vec![Interval::new(start, end)]);
    }

    #[test]
    fn test_hourly_buckets_cover_range_exactly() {
        let p = Partitioner::with_bucket_hours(1);
        let start = dt("2023-12-31T22:00:00");
        let end = dt("2024-01-01T04:00:00");
        let buckets = p.partition(start, end);
        assert_eq!(buckets.len(), 6);
        assert_covers(&buckets, start, end);
        assert!(buckets.iter().all(|b| b.duration() == Duration::hours(1)));
    }

    #[test]
    fn test_coverage_for_various_bucket_sizes() {
        let start = dt("2023-02-27T07:00:00");
        let end = dt("2023-03-04T19:00:00");
        for hours in [1, 2, 5, 6, 12, 24, 48, 168] {
            let p = Partitioner::with_bucket_hours(hours);
            let buckets = p.partition(start, end);
            assert_covers(&buckets, start, end);
            let total: Duration = buckets
                .iter()
                .fold(Duration::zero(), |acc, b| acc + b.duration());
            assert_eq!(total, end - start, "bucket_hours={}", hours);
            assert!(buckets
                .iter()
                .all(|b| b.duration() <= Duration::hours(i64::from(hours))));
        }
    }

    #[test]
    fn test_huge_bucket_yields_single_bucket() {
        let p = Partitioner::with_bucket_hours(u32::MAX);
        let start = dt("2024-01-01T00:00:00");
        let end = dt("2024-01-01T05:00:00");
        assert_eq!(p.partition(start, end), vec![Interval::new(start, end)]);
    }

    #[test]
    fn test_zero_bucket_hours_clamped() {
        assert_eq!(Partitioner::with_bucket_hours(0).bucket(), Duration::hours(1));
    }

    #[test]
    fn test_boundaries_before_epoch() {
        let p = Partitioner::default();
        let start = dt("1969-12-30T12:00:00");
        let end = dt("1970-01-01T06:00:00");
        let buckets = p.partition(start, end);
        assert_covers(&buckets, start, end);
        assert_eq!(buckets[0].end, dt("1969-12-31T00:00:00"));
        assert_eq!(buckets[1].end, dt("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_interval_display() {
        let i = Interval::new(dt("2024-01-01T00:00:00"), dt("2024-01-02T00:00:00"));
        assert_eq!(i.to_string(), "[2024-01-01T00:00:00 .. 2024-01-02T00:00:00)");
    }
}
