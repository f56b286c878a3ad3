//! Zero-filling of months without records.

use crate::{accumulator::RawAccumulator, aggregation::GroupedMap, bucket::BucketKey};

/// Makes `grouped` rectangular over `buckets`.
///
/// Every dimension gets an accumulator for every bucket in `buckets`, a zero
/// accumulator where it had no records. Buckets outside the range that are
/// already present are kept untouched.
pub fn fill_gaps(mut grouped: GroupedMap, buckets: &[BucketKey]) -> GroupedMap {
    for cells in grouped.values_mut() {
        for bucket in buckets {
            cells.entry(*bucket).or_insert_with(RawAccumulator::zero);
        }
    }

    grouped
}
