//! Pooled totals across dimensions and buckets.
//!
//! Totals are always built by summing raw accumulators field by field and
//! only then applying a metric. Summing or averaging already-derived values
//! is wrong for ratios and averages: nine sources converting at 20% each do
//! not add up to a 180% conversion rate, and averaging per-source rates
//! ignores how many leads each source brought in.

use std::collections::BTreeMap;

use crate::{accumulator::RawAccumulator, aggregation::GroupedMap, bucket::BucketKey};

/// The name of the synthetic totals row.
pub const TOTAL_LABEL: &str = "TOTAL";

/// Sums accumulators across every dimension, per bucket.
pub fn totals(grouped: &GroupedMap) -> BTreeMap<BucketKey, RawAccumulator> {
    let mut totals: BTreeMap<BucketKey, RawAccumulator> = BTreeMap::new();

    for cells in grouped.values() {
        for (bucket, accumulator) in cells {
            totals.entry(*bucket).or_default().merge(accumulator);
        }
    }

    totals
}

/// Sums each dimension's accumulators over the buckets in `buckets`.
///
/// Buckets outside `buckets` do not contribute, so the row total matches the
/// columns the caller actually shows.
pub fn row_totals(
    grouped: &GroupedMap,
    buckets: &[BucketKey],
) -> BTreeMap<String, RawAccumulator> {
    grouped
        .iter()
        .map(|(dimension, cells)| {
            let total: RawAccumulator = buckets
                .iter()
                .filter_map(|bucket| cells.get(bucket))
                .sum();
            (dimension.clone(), total)
        })
        .collect()
}
