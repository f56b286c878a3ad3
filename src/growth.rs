//! Period-over-period growth percentages.

use std::collections::BTreeMap;

use crate::bucket::BucketKey;

/// The percentage change from `previous` to `current`.
///
/// A zero base is handled by policy rather than arithmetic: no change from
/// zero is `0` and any increase from zero is reported as `100`, never as an
/// infinite or undefined value. A decrease from zero (only possible for
/// signed values such as net amounts) is reported as `-100`.
pub fn growth(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current == 0.0 {
            0.0
        } else if current > 0.0 {
            100.0
        } else {
            -100.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Month-over-month growth for a series of monthly values.
///
/// Each bucket is compared with the calendar month immediately before it.
/// `value_of` is asked for that month's value, so the first bucket of a range
/// can still be compared with a month the range does not include.
pub fn month_over_month<F>(buckets: &[BucketKey], value_of: F) -> BTreeMap<BucketKey, f64>
where
    F: Fn(BucketKey) -> f64,
{
    buckets
        .iter()
        .map(|bucket| {
            let current = value_of(*bucket);
            let previous = value_of(bucket.previous());
            (*bucket, growth(current, previous))
        })
        .collect()
}

/// Year-over-year growth for the buckets of `compare_year`.
///
/// Each bucket in `buckets` that falls in `compare_year` is compared with the
/// bucket of the same month-number in `base_year`. Buckets in other years get
/// no growth value.
pub fn year_over_year<F>(
    buckets: &[BucketKey],
    base_year: i32,
    compare_year: i32,
    value_of: F,
) -> BTreeMap<BucketKey, f64>
where
    F: Fn(BucketKey) -> f64,
{
    buckets
        .iter()
        .filter(|bucket| bucket.year() == compare_year)
        .map(|bucket| {
            let current = value_of(*bucket);
            let previous = value_of(bucket.with_year(base_year));
            (*bucket, growth(current, previous))
        })
        .collect()
}
