//! Bucket range policies.
//!
//! The engine fills whatever ordered range of buckets it is given. These
//! helpers build the ranges dashboards usually ask for: a trailing window
//! ending at the current month, or two calendar years lined up for a
//! year-over-year comparison.

use crate::{Error, bucket::BucketKey};

/// Every month from `start` to `end` inclusive, in chronological order.
///
/// Returns an empty range if `start` is after `end`.
pub fn months_between(start: BucketKey, end: BucketKey) -> Vec<BucketKey> {
    let mut months = Vec::new();
    let mut month = start;

    while month <= end {
        months.push(month);
        month = month.next();
    }

    months
}

/// The `count` months ending at (and including) `end`, oldest first.
///
/// The window stops early at the first month of year -9999.
pub fn trailing_months(end: BucketKey, count: usize) -> Vec<BucketKey> {
    let mut months: Vec<BucketKey> = std::iter::successors(Some(end), |month| {
        let previous = month.previous();
        BucketKey::new(previous.year(), previous.month_number()).ok()
    })
    .take(count)
    .collect();

    months.reverse();
    months
}

/// January through `through_month` of `year`.
///
/// # Errors
/// Returns [Error::InvalidBucketKey] if `through_month` is not in `1..=12`.
pub fn months_of_year(year: i32, through_month: u8) -> Result<Vec<BucketKey>, Error> {
    let end = BucketKey::new(year, through_month)?;
    Ok(months_between(BucketKey::new(year, 1)?, end))
}

/// All twelve months of `base_year` followed by January through
/// `through_month` of `compare_year`.
///
/// # Errors
/// Returns [Error::InvalidComparison] if `compare_year` is not after
/// `base_year`, or [Error::InvalidBucketKey] if `through_month` is not in
/// `1..=12`.
pub fn year_over_year_range(
    base_year: i32,
    compare_year: i32,
    through_month: u8,
) -> Result<Vec<BucketKey>, Error> {
    if compare_year <= base_year {
        return Err(Error::InvalidComparison(format!(
            "the compare year {compare_year} must be after the base year {base_year}"
        )));
    }

    let mut months = months_of_year(base_year, 12)?;
    months.extend(months_of_year(compare_year, through_month)?);

    Ok(months)
}

#[cfg(test)]
mod tests {
    use crate::{Error, bucket::BucketKey};

    use super::{months_between, months_of_year, trailing_months, year_over_year_range};

    fn key(text: &str) -> BucketKey {
        BucketKey::parse(text).unwrap()
    }

    #[test]
    fn trailing_window_ends_at_current_month() {
        let months = trailing_months(key("2025-03"), 18);

        assert_eq!(months.len(), 18);
        assert_eq!(months[0], key("2023-10"));
        assert_eq!(months[17], key("2025-03"));
        assert!(months.windows(2).all(|pair| pair[0].next() == pair[1]));
    }

    #[test]
    fn empty_trailing_window() {
        assert!(trailing_months(key("2025-03"), 0).is_empty());
    }

    #[test]
    fn huge_trailing_window_stops_at_the_first_calendar_month() {
        let end = BucketKey::new(-9999, 2).unwrap();

        let months = trailing_months(end, usize::MAX);

        assert_eq!(months, vec![BucketKey::new(-9999, 1).unwrap(), end]);
    }

    #[test]
    fn months_between_is_inclusive() {
        assert_eq!(
            months_between(key("2024-11"), key("2025-02")),
            vec![key("2024-11"), key("2024-12"), key("2025-01"), key("2025-02")]
        );
        assert!(months_between(key("2025-02"), key("2024-11")).is_empty());
    }

    #[test]
    fn months_of_year_through_month() {
        let months = months_of_year(2025, 4).unwrap();

        assert_eq!(
            months,
            vec![key("2025-01"), key("2025-02"), key("2025-03"), key("2025-04")]
        );
        assert!(months_of_year(2025, 13).is_err());
    }

    #[test]
    fn year_over_year_range_covers_both_years() {
        let months = year_over_year_range(2024, 2025, 6).unwrap();

        assert_eq!(months.len(), 18);
        assert_eq!(months[0], key("2024-01"));
        assert_eq!(months[11], key("2024-12"));
        assert_eq!(months[12], key("2025-01"));
        assert_eq!(months[17], key("2025-06"));
    }

    #[test]
    fn year_over_year_range_rejects_reversed_years() {
        assert!(matches!(
            year_over_year_range(2025, 2024, 6),
            Err(Error::InvalidComparison(_))
        ));
    }
}
