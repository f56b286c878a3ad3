//! Derived metrics computed from raw accumulators.
//!
//! Metrics are looked up by name in a [MetricRegistry] so that adding a metric
//! is a single registry entry. The built-in vocabulary is [Metric]; callers can
//! register their own definitions on top of it, typically ratios over an extra
//! counter.
//!
//! Every ratio and average saturates to `0.0` when its denominator is zero, so
//! a metric value is never `NaN` or infinite. Ratios are not clamped: counters
//! that are inconsistent by construction (more conversions than records) give
//! a ratio above 100.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::Serialize;

use crate::{Error, accumulator::RawAccumulator};

/// How a metric value should be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// A plain count of records.
    Count,
    /// A monetary amount.
    Currency,
    /// A percentage in the 0-100 scale.
    Percentage,
}

/// The built-in metric vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// The number of records.
    Count,
    /// The sum of the amount fact.
    Sum,
    /// The sum of the amount fact divided by the number of records.
    AveragePerRecord,
    /// Converted records as a percentage of all records.
    ConversionRate,
    /// Converted records as a percentage of records that reached the trial
    /// stage, e.g. trial to member.
    StageConversionRate,
    /// Lost records as a percentage of all records.
    LossRate,
}

impl Metric {
    /// Every built-in metric.
    pub const ALL: [Metric; 6] = [
        Metric::Count,
        Metric::Sum,
        Metric::AveragePerRecord,
        Metric::ConversionRate,
        Metric::StageConversionRate,
        Metric::LossRate,
    ];

    /// The registry name of the metric.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::Sum => "sum",
            Metric::AveragePerRecord => "averagePerRecord",
            Metric::ConversionRate => "conversionRate",
            Metric::StageConversionRate => "stageConversionRate",
            Metric::LossRate => "lossRate",
        }
    }

    /// How values of this metric are displayed.
    pub fn kind(self) -> ValueKind {
        match self {
            Metric::Count => ValueKind::Count,
            Metric::Sum | Metric::AveragePerRecord => ValueKind::Currency,
            Metric::ConversionRate | Metric::StageConversionRate | Metric::LossRate => {
                ValueKind::Percentage
            }
        }
    }

    /// Compute the metric for one accumulator.
    pub fn compute(self, accumulator: &RawAccumulator) -> f64 {
        let count = accumulator.count as f64;

        match self {
            Metric::Count => count,
            Metric::Sum => accumulator.sum_amount,
            Metric::AveragePerRecord => average(accumulator.sum_amount, count),
            Metric::ConversionRate => ratio(accumulator.count_converted as f64, count),
            Metric::StageConversionRate => ratio(
                accumulator.count_converted as f64,
                accumulator.count_trial as f64,
            ),
            Metric::LossRate => ratio(accumulator.count_lost as f64, count),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == s)
            .ok_or_else(|| Error::UnknownMetric(s.to_owned()))
    }
}

/// `numerator / denominator * 100`, or `0.0` when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// `sum / count`, or `0.0` when the count is zero.
pub fn average(sum: f64, count: f64) -> f64 {
    if count == 0.0 { 0.0 } else { sum / count }
}

type MetricFn = Arc<dyn Fn(&RawAccumulator) -> f64 + Send + Sync>;

/// A named formula over a [RawAccumulator].
#[derive(Clone)]
pub struct MetricDefinition {
    name: String,
    kind: ValueKind,
    compute: MetricFn,
}

impl MetricDefinition {
    /// Create a metric definition from a formula.
    ///
    /// The formula must not return non-finite values, use [ratio] and
    /// [average] for anything with a denominator.
    pub fn new(
        name: &str,
        kind: ValueKind,
        compute: impl Fn(&RawAccumulator) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            compute: Arc::new(compute),
        }
    }

    /// The registry name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How values of this metric are displayed.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Compute the metric for one accumulator.
    pub fn compute(&self, accumulator: &RawAccumulator) -> f64 {
        (self.compute)(accumulator)
    }
}

impl From<Metric> for MetricDefinition {
    fn from(metric: Metric) -> Self {
        MetricDefinition::new(metric.name(), metric.kind(), move |accumulator| {
            metric.compute(accumulator)
        })
    }
}

impl fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Maps metric names to their definitions.
///
/// The default registry holds every built-in [Metric].
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, MetricDefinition>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        let metrics = Metric::ALL
            .into_iter()
            .map(|metric| (metric.name().to_owned(), MetricDefinition::from(metric)))
            .collect();

        Self { metrics }
    }
}

impl MetricRegistry {
    /// A registry holding the built-in metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `definition` to the registry, replacing any metric with the same
    /// name.
    pub fn register(&mut self, definition: MetricDefinition) -> &mut Self {
        self.metrics
            .insert(definition.name().to_owned(), definition);
        self
    }

    /// Look up a metric by name.
    ///
    /// # Errors
    /// Returns [Error::UnknownMetric] if no metric is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&MetricDefinition, Error> {
        self.metrics
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_owned()))
    }

    /// Compute the metric called `name` for `accumulator`.
    ///
    /// # Errors
    /// Returns [Error::UnknownMetric] if no metric is registered under `name`.
    pub fn compute(&self, accumulator: &RawAccumulator, name: &str) -> Result<f64, Error> {
        self.get(name)
            .map(|definition| definition.compute(accumulator))
    }

    /// The names of every registered metric, in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, accumulator::RawAccumulator};

    use super::{Metric, MetricDefinition, MetricRegistry, ValueKind, average, ratio};

    fn accumulator(count: u64, converted: u64, trial: u64, lost: u64, sum: f64) -> RawAccumulator {
        RawAccumulator {
            count,
            sum_amount: sum,
            count_converted: converted,
            count_trial: trial,
            count_lost: lost,
            ..Default::default()
        }
    }

    #[test]
    fn built_in_formulas() {
        let cell = accumulator(8, 2, 4, 1, 1000.0);

        assert_eq!(Metric::Count.compute(&cell), 8.0);
        assert_eq!(Metric::Sum.compute(&cell), 1000.0);
        assert_eq!(Metric::AveragePerRecord.compute(&cell), 125.0);
        assert_eq!(Metric::ConversionRate.compute(&cell), 25.0);
        assert_eq!(Metric::StageConversionRate.compute(&cell), 50.0);
        assert_eq!(Metric::LossRate.compute(&cell), 12.5);
    }

    #[test]
    fn ratios_divide_before_scaling() {
        let cell = accumulator(3, 1, 0, 0, 0.0);

        assert_eq!(Metric::ConversionRate.compute(&cell), 1.0 / 3.0 * 100.0);
    }

    #[test]
    fn zero_denominators_saturate_to_zero_for_every_metric() {
        let empty = RawAccumulator::zero();

        for metric in Metric::ALL {
            let value = metric.compute(&empty);
            assert_eq!(value, 0.0, "{metric} should be 0 for an empty cell");
            assert!(value.is_finite());
        }

        // Conversions without any trials must not divide by zero either.
        let no_trials = accumulator(5, 2, 0, 0, 10.0);
        assert_eq!(Metric::StageConversionRate.compute(&no_trials), 0.0);
    }

    #[test]
    fn inconsistent_counters_are_not_clamped() {
        let cell = accumulator(2, 3, 0, 0, 0.0);

        assert_eq!(Metric::ConversionRate.compute(&cell), 150.0);
    }

    #[test]
    fn ratio_and_average_helpers() {
        assert_eq!(ratio(1.0, 4.0), 25.0);
        assert_eq!(ratio(1.0, 0.0), 0.0);
        assert_eq!(average(10.0, 4.0), 2.5);
        assert_eq!(average(10.0, 0.0), 0.0);
    }

    #[test]
    fn metric_names_round_trip_through_from_str() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>(), Ok(metric));
        }
    }

    #[test]
    fn unknown_metric_fails_fast() {
        let registry = MetricRegistry::new();

        assert_eq!(
            registry.compute(&RawAccumulator::zero(), "totalLeadz"),
            Err(Error::UnknownMetric("totalLeadz".to_owned()))
        );
        assert_eq!(
            "totalLeadz".parse::<Metric>(),
            Err(Error::UnknownMetric("totalLeadz".to_owned()))
        );
    }

    #[test]
    fn registry_computes_built_ins_by_name() {
        let registry = MetricRegistry::new();
        let cell = accumulator(10, 4, 0, 0, 0.0);

        assert_eq!(registry.compute(&cell, "conversionRate"), Ok(40.0));
        assert_eq!(registry.names().count(), Metric::ALL.len());
    }

    #[test]
    fn registry_accepts_custom_metrics() {
        let mut registry = MetricRegistry::new();
        registry.register(MetricDefinition::new(
            "noShowRate",
            ValueKind::Percentage,
            |accumulator| ratio(accumulator.extra("noShows"), accumulator.count as f64),
        ));

        let mut cell = accumulator(20, 0, 0, 0, 0.0);
        cell.extra.insert("noShows".to_owned(), 5.0);

        assert_eq!(registry.compute(&cell, "noShowRate"), Ok(25.0));
        assert_eq!(
            registry.get("noShowRate").unwrap().kind(),
            ValueKind::Percentage
        );
        assert_eq!(registry.compute(&RawAccumulator::zero(), "noShowRate"), Ok(0.0));
    }
}
