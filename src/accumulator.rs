//! Additive counters collected per (dimension, bucket) cell.

use std::collections::BTreeMap;

use serde::Serialize;

/// The raw counters for one pivot cell before any ratio or average is taken.
///
/// Accumulation is pure addition: counters are only ever incremented, and two
/// accumulators are combined field by field with [RawAccumulator::merge].
/// Derived metrics are always computed from these raw values, never from other
/// derived values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawAccumulator {
    /// The number of records in the cell.
    pub count: u64,
    /// The sum of the amount fact over the cell's records.
    pub sum_amount: f64,
    /// The number of records that converted.
    pub count_converted: u64,
    /// The number of records that reached the intermediate (trial) stage.
    pub count_trial: u64,
    /// The number of records that were lost.
    pub count_lost: u64,
    /// Caller-defined counters, keyed by name.
    pub extra: BTreeMap<String, f64>,
}

impl RawAccumulator {
    /// An accumulator with every counter at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether no record has been added to this accumulator.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The value of the extra counter `name`, `0.0` if it was never counted.
    pub fn extra(&self, name: &str) -> f64 {
        self.extra.get(name).copied().unwrap_or(0.0)
    }

    /// Add every counter of `other` to this accumulator.
    pub fn merge(&mut self, other: &RawAccumulator) {
        self.count += other.count;
        self.sum_amount += other.sum_amount;
        self.count_converted += other.count_converted;
        self.count_trial += other.count_trial;
        self.count_lost += other.count_lost;

        for (name, value) in &other.extra {
            *self.extra.entry(name.clone()).or_insert(0.0) += value;
        }
    }
}

impl<'a> std::iter::Sum<&'a RawAccumulator> for RawAccumulator {
    fn sum<I: Iterator<Item = &'a RawAccumulator>>(iter: I) -> Self {
        iter.fold(RawAccumulator::zero(), |mut total, accumulator| {
            total.merge(accumulator);
            total
        })
    }
}
