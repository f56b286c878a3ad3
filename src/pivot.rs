//! The pivot: records in, `dimension x month` metric table out.
//!
//! [compute_pivot] runs the whole pipeline:
//!
//! 1. normalise the raw records,
//! 2. group them by dimension and calendar month,
//! 3. fill every dimension's months without records with zero
//!    accumulators, so each dimension has a row over the requested range,
//! 4. apply the metric to every cell, to the pooled `TOTAL` row, to each
//!    dimension's total across the range and to the grand total,
//! 5. optionally compute month-over-month or year-over-year growth.
//!
//! The computation is a pure function of its inputs. It keeps no state
//! between calls, so pivots for different views can be computed on different
//! threads over the same records.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    Error,
    accumulator::RawAccumulator,
    aggregation::{CounterRules, aggregate, aggregate_undated, by_month},
    bucket::BucketKey,
    gaps::fill_gaps,
    growth::{growth, month_over_month, year_over_year},
    metric::{MetricDefinition, MetricRegistry, ValueKind},
    record::{NormalizeOptions, NormalizedRecord, RawRecord, UNKNOWN_LABEL, normalize},
    totals::{TOTAL_LABEL, row_totals, totals},
};

/// Which periods growth compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Each month is compared with the calendar month before it.
    MonthOverMonth,
    /// Each month of `compare_year` is compared with the same month of
    /// `base_year`.
    YearOverYear {
        /// The earlier year, the baseline.
        base_year: i32,
        /// The year whose months get a growth value.
        compare_year: i32,
    },
}

/// Everything [compute_pivot] needs besides the records and the dimension
/// key.
#[derive(Clone)]
pub struct PivotRequest {
    /// The ordered months to show as columns.
    pub buckets: Vec<BucketKey>,
    /// The registry name of the metric to compute.
    pub metric: String,
    /// Which periods growth compares.
    pub mode: ComparisonMode,
    /// Whether to compute growth at all.
    pub with_growth: bool,
    /// How records increment the raw counters.
    pub rules: CounterRules,
    /// How raw records are normalised.
    pub normalize: NormalizeOptions,
    /// Where the metric is looked up.
    pub registry: MetricRegistry,
}

impl PivotRequest {
    /// A month-over-month request for `metric` over `buckets`, without growth.
    pub fn new(metric: &str, buckets: Vec<BucketKey>) -> Self {
        Self {
            buckets,
            metric: metric.to_owned(),
            mode: ComparisonMode::MonthOverMonth,
            with_growth: false,
            rules: CounterRules::default(),
            normalize: NormalizeOptions::default(),
            registry: MetricRegistry::default(),
        }
    }

    /// Set the comparison mode.
    pub fn mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    /// Compute growth alongside the metric values.
    pub fn with_growth(mut self) -> Self {
        self.with_growth = true;
        self
    }

    /// Set the counter rules.
    pub fn rules(mut self, rules: CounterRules) -> Self {
        self.rules = rules;
        self
    }

    /// Read record timestamps from `field`.
    pub fn timestamp_field(mut self, field: &str) -> Self {
        self.normalize.timestamp_field = field.to_owned();
        self
    }

    /// Look metrics up in `registry` instead of the built-in registry.
    pub fn registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Growth values for every row of a pivot and for its `TOTAL` row.
///
/// Month-over-month growth has a value for every requested month. In
/// year-over-year mode only the months of the compare year have a value,
/// the base-year months are the baseline and have none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Growth {
    /// Growth per dimension and month.
    pub rows: BTreeMap<String, BTreeMap<BucketKey, f64>>,
    /// Growth of the `TOTAL` row per month, with the same months as `rows`.
    pub totals: BTreeMap<BucketKey, f64>,
}

/// A metric table of dimensions by months.
///
/// Every dimension in `rows` has a value for every month in `buckets`, `0.0`
/// for months without records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResult {
    /// The registry name of the metric.
    pub metric: String,
    /// How the metric values should be displayed.
    pub kind: ValueKind,
    /// The months shown as columns, in the order requested.
    pub buckets: Vec<BucketKey>,
    /// The metric value per dimension and month.
    pub rows: BTreeMap<String, BTreeMap<BucketKey, f64>>,
    /// The pooled `TOTAL` row per month.
    pub totals: BTreeMap<BucketKey, f64>,
    /// The pooled value of each dimension across all requested months.
    pub row_totals: BTreeMap<String, f64>,
    /// The pooled value across all dimensions and requested months.
    pub grand_total: f64,
    /// Growth values, present only if growth was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<Growth>,
    /// The number of records left out because their timestamp could not be
    /// parsed.
    pub undated_records: usize,
}

/// One month-number of a year-over-year comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPair {
    /// The month-number, 1 for January through 12 for December.
    pub month: u8,
    /// The three-letter month name.
    pub label: &'static str,
    /// The value in the base year.
    pub base: f64,
    /// The value in the compare year.
    pub compare: f64,
    /// The growth from `base` to `compare`.
    pub growth: f64,
}

impl PivotResult {
    /// The value of `dimension` in `bucket`, if both are part of the pivot.
    ///
    /// Use [TOTAL_LABEL] as the dimension to read the `TOTAL` row.
    pub fn value(&self, dimension: &str, bucket: BucketKey) -> Option<f64> {
        self.row(dimension)?.get(&bucket).copied()
    }

    /// The row for `dimension`, or the `TOTAL` row for [TOTAL_LABEL].
    pub fn row(&self, dimension: &str) -> Option<&BTreeMap<BucketKey, f64>> {
        if dimension == TOTAL_LABEL {
            Some(&self.totals)
        } else {
            self.rows.get(dimension)
        }
    }

    /// The dimension names in display order: alphabetical, with
    /// [UNKNOWN_LABEL] last.
    pub fn ordered_dimensions(&self) -> Vec<&str> {
        let mut dimensions: Vec<&str> = self
            .rows
            .keys()
            .map(String::as_str)
            .filter(|&dimension| dimension != UNKNOWN_LABEL)
            .collect();

        if self.rows.contains_key(UNKNOWN_LABEL) {
            dimensions.push(UNKNOWN_LABEL);
        }

        dimensions
    }

    /// Pairs the months of `base_year` and `compare_year` by month-number for
    /// `dimension` (or the `TOTAL` row for [TOTAL_LABEL]).
    ///
    /// Only month-numbers that appear in the pivot's buckets for either year
    /// are listed. Months outside the pivot count as `0.0`.
    pub fn month_pairs(&self, dimension: &str, base_year: i32, compare_year: i32) -> Vec<MonthPair> {
        let Some(row) = self.row(dimension) else {
            return Vec::new();
        };

        let months: BTreeSet<u8> = self
            .buckets
            .iter()
            .filter(|bucket| bucket.year() == base_year || bucket.year() == compare_year)
            .map(|bucket| bucket.month_number())
            .collect();

        months
            .into_iter()
            .filter_map(|month| {
                let base_bucket = BucketKey::new(base_year, month).ok()?;
                let compare_bucket = base_bucket.with_year(compare_year);
                let base = row.get(&base_bucket).copied().unwrap_or(0.0);
                let compare = row.get(&compare_bucket).copied().unwrap_or(0.0);

                Some(MonthPair {
                    month,
                    label: base_bucket.short_label(),
                    base,
                    compare,
                    growth: growth(compare, base),
                })
            })
            .collect()
    }
}

/// A metric per dimension without time buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// The registry name of the metric.
    pub metric: String,
    /// How the metric values should be displayed.
    pub kind: ValueKind,
    /// The metric value per dimension.
    pub rows: BTreeMap<String, f64>,
    /// The pooled value across all dimensions.
    pub total: f64,
    /// The number of records summarised, dated or not.
    pub records: usize,
}

/// Computes a pivot of `records` by `dimension_key` and calendar month.
///
/// # Errors
/// Returns [Error::UnknownMetric] if `request.metric` is not registered, or
/// [Error::InvalidComparison] if a year-over-year comparison uses the same
/// year twice. Bad input data never causes an error.
pub fn compute_pivot<D>(
    records: &[RawRecord],
    dimension_key: D,
    request: &PivotRequest,
) -> Result<PivotResult, Error>
where
    D: Fn(&NormalizedRecord) -> String,
{
    let definition = request.registry.get(&request.metric)?;

    if let ComparisonMode::YearOverYear {
        base_year,
        compare_year,
    } = request.mode
    {
        if base_year == compare_year {
            return Err(Error::InvalidComparison(format!(
                "cannot compare {base_year} with itself"
            )));
        }
    }

    if request.buckets.is_empty() {
        tracing::warn!("Computing a pivot over an empty bucket range");
    }

    let normalized: Vec<NormalizedRecord> = records
        .iter()
        .map(|record| normalize(record, &request.normalize))
        .collect();
    let undated_records = normalized
        .iter()
        .filter(|record| record.date().is_none())
        .count();

    let grouped = aggregate(&normalized, dimension_key, by_month, &request.rules);
    let bucket_totals = totals(&grouped);
    let filled = fill_gaps(grouped, &request.buckets);

    let compute = |accumulator: Option<&RawAccumulator>| {
        accumulator.map_or(0.0, |accumulator| definition.compute(accumulator))
    };

    let rows = filled
        .iter()
        .map(|(dimension, cells)| {
            let values = request
                .buckets
                .iter()
                .map(|bucket| (*bucket, compute(cells.get(bucket))))
                .collect();
            (dimension.clone(), values)
        })
        .collect();

    let totals_row = request
        .buckets
        .iter()
        .map(|bucket| (*bucket, compute(bucket_totals.get(bucket))))
        .collect();

    let range_totals = row_totals(&filled, &request.buckets);
    let pooled: RawAccumulator = range_totals.values().sum();
    let grand_total = definition.compute(&pooled);
    let row_totals = range_totals
        .iter()
        .map(|(dimension, accumulator)| (dimension.clone(), definition.compute(accumulator)))
        .collect();

    let growth = request.with_growth.then(|| {
        let rows = filled
            .iter()
            .map(|(dimension, cells)| {
                let values = growth_for(request, |bucket| compute(cells.get(&bucket)));
                (dimension.clone(), values)
            })
            .collect();
        let totals = growth_for(request, |bucket| compute(bucket_totals.get(&bucket)));

        Growth { rows, totals }
    });

    tracing::debug!(
        "Computed {} pivot over {} records ({} undated), {} dimensions x {} buckets",
        request.metric,
        records.len(),
        undated_records,
        filled.len(),
        request.buckets.len()
    );

    Ok(PivotResult {
        metric: definition.name().to_owned(),
        kind: definition.kind(),
        buckets: request.buckets.clone(),
        rows,
        totals: totals_row,
        row_totals,
        grand_total,
        growth,
        undated_records,
    })
}

/// Computes `request.metric` per dimension over every record, including
/// records whose timestamp could not be parsed.
///
/// The request's buckets and comparison mode are ignored.
///
/// # Errors
/// Returns [Error::UnknownMetric] if `request.metric` is not registered.
pub fn summarize<D>(
    records: &[RawRecord],
    dimension_key: D,
    request: &PivotRequest,
) -> Result<Summary, Error>
where
    D: Fn(&NormalizedRecord) -> String,
{
    let definition: &MetricDefinition = request.registry.get(&request.metric)?;

    let normalized: Vec<NormalizedRecord> = records
        .iter()
        .map(|record| normalize(record, &request.normalize))
        .collect();
    let grouped = aggregate_undated(&normalized, dimension_key, &request.rules);

    let pooled: RawAccumulator = grouped.values().sum();
    let total = definition.compute(&pooled);
    let rows = grouped
        .iter()
        .map(|(dimension, accumulator)| (dimension.clone(), definition.compute(accumulator)))
        .collect();

    Ok(Summary {
        metric: definition.name().to_owned(),
        kind: definition.kind(),
        rows,
        total,
        records: normalized.len(),
    })
}

fn growth_for<F>(request: &PivotRequest, value_of: F) -> BTreeMap<BucketKey, f64>
where
    F: Fn(BucketKey) -> f64,
{
    match request.mode {
        ComparisonMode::MonthOverMonth => month_over_month(&request.buckets, value_of),
        ComparisonMode::YearOverYear {
            base_year,
            compare_year,
        } => year_over_year(&request.buckets, base_year, compare_year, value_of),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        Error,
        aggregation::{CounterRules, by_dimension, flag_is},
        bucket::BucketKey,
        metric::{MetricDefinition, MetricRegistry, ValueKind, ratio},
        range::{months_between, year_over_year_range},
        record::{RawRecord, UNKNOWN_LABEL, Value},
        totals::TOTAL_LABEL,
    };

    use super::{ComparisonMode, PivotRequest, compute_pivot, summarize};

    fn key(text: &str) -> BucketKey {
        BucketKey::parse(text).unwrap()
    }

    fn lead(date: &str, source: &str, converted: bool) -> RawRecord {
        RawRecord::new()
            .with("date", date)
            .with("source", source)
            .with("converted", converted)
    }

    fn lead_rules() -> CounterRules {
        CounterRules::new().converted_when(flag_is("converted"))
    }

    fn conversion_request(buckets: Vec<BucketKey>) -> PivotRequest {
        PivotRequest::new("conversionRate", buckets).rules(lead_rules())
    }

    #[test]
    fn end_to_end_conversion_rate() {
        let records = vec![
            lead("2024-01-05", "Google", true),
            lead("2024-01-20", "Google", false),
            lead("2024-02-01", "Referral", true),
        ];
        let request = conversion_request(vec![key("2024-01"), key("2024-02")]);

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        assert_eq!(pivot.rows["Google"][&key("2024-01")], 50.0);
        assert_eq!(pivot.rows["Google"][&key("2024-02")], 0.0);
        assert_eq!(pivot.rows["Referral"][&key("2024-01")], 0.0);
        assert_eq!(pivot.rows["Referral"][&key("2024-02")], 100.0);
        assert_eq!(pivot.totals[&key("2024-01")], 50.0);
        assert_eq!(pivot.totals[&key("2024-02")], 100.0);
        assert!(pivot.growth.is_none());
        assert_eq!(pivot.kind, ValueKind::Percentage);
    }

    #[test]
    fn pivot_is_rectangular() {
        let records = vec![
            lead("2024-01-05", "Google", true),
            lead("2024-03-20", "Referral", false),
            lead("2024-06-01", "Walk-in", true),
        ];
        let buckets = months_between(key("2024-01"), key("2024-06"));
        let request = conversion_request(buckets.clone()).with_growth();

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();
        let growth = pivot.growth.as_ref().unwrap();

        assert_eq!(pivot.rows.len(), 3);
        for (dimension, row) in &pivot.rows {
            for bucket in &buckets {
                assert!(row.contains_key(bucket), "{dimension} is missing {bucket}");
                assert!(growth.rows[dimension].contains_key(bucket));
            }
        }
        for bucket in &buckets {
            assert!(pivot.totals.contains_key(bucket));
            assert!(growth.totals.contains_key(bucket));
        }
    }

    #[test]
    fn totals_use_pooled_rate() {
        let mut records = Vec::new();
        for index in 0..100 {
            records.push(lead("2024-01-10", "Google", index < 90));
        }
        for index in 0..10 {
            records.push(lead("2024-01-11", "Referral", index < 1));
        }
        let request = conversion_request(vec![key("2024-01")]);

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        let naive_average = (pivot.rows["Google"][&key("2024-01")]
            + pivot.rows["Referral"][&key("2024-01")])
            / 2.0;
        let pooled = 91.0 / 110.0 * 100.0;

        assert_eq!(pivot.totals[&key("2024-01")], pooled);
        assert_eq!(pivot.grand_total, pooled);
        assert!((naive_average - 50.0).abs() < 1e-9);
        assert_ne!(pivot.totals[&key("2024-01")], naive_average);
    }

    #[test]
    fn empty_cells_saturate_to_zero_for_every_metric() {
        let records = vec![lead("2024-01-05", "Google", true)];
        let registry = MetricRegistry::new();

        for metric in registry.names() {
            let request = conversion_request(vec![key("2024-01"), key("2024-02")])
                .mode(ComparisonMode::MonthOverMonth);
            let request = PivotRequest {
                metric: metric.to_owned(),
                ..request
            }
            .with_growth();

            let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

            assert_eq!(pivot.rows["Google"][&key("2024-02")], 0.0, "{metric}");
            assert_eq!(pivot.totals[&key("2024-02")], 0.0, "{metric}");
            for value in pivot.rows["Google"].values().chain(pivot.totals.values()) {
                assert!(value.is_finite(), "{metric} produced {value}");
            }
        }
    }

    #[test]
    fn repeated_computation_is_identical() {
        let records = vec![
            lead("2024-01-05", "Google", true),
            lead("2024-01-07", "Referral", false),
            lead("2024-02-05", "Instagram", true),
            lead("2024-02-09", "Google", false),
            lead("bad date", "Google", true),
        ];
        let request = conversion_request(months_between(key("2023-12"), key("2024-03")))
            .with_growth();

        let first = compute_pivot(&records, by_dimension("source"), &request).unwrap();
        let second = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn missing_dimension_is_reported_as_unknown() {
        let records = vec![
            lead("2024-01-05", "Google", false),
            RawRecord::new()
                .with("date", "2024-01-06")
                .with("converted", true),
            RawRecord::new()
                .with("date", "2024-01-07")
                .with("source", Value::Null)
                .with("converted", true),
        ];
        let request = PivotRequest::new("count", vec![key("2024-01")]).rules(lead_rules());

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        assert_eq!(pivot.rows[UNKNOWN_LABEL][&key("2024-01")], 2.0);
        assert_eq!(pivot.rows["Google"][&key("2024-01")], 1.0);
        assert_eq!(pivot.totals[&key("2024-01")], 3.0);
        assert_eq!(pivot.ordered_dimensions(), vec!["Google", UNKNOWN_LABEL]);
    }

    #[test]
    fn undated_records_are_counted_but_not_bucketed() {
        let records = vec![
            lead("2024-01-05", "Google", true),
            lead("someday", "Google", true),
            RawRecord::new().with("source", "Google"),
        ];
        let request = PivotRequest::new("count", vec![key("2024-01")]).rules(lead_rules());

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        assert_eq!(pivot.rows["Google"][&key("2024-01")], 1.0);
        assert_eq!(pivot.undated_records, 2);

        let summary = summarize(&records, by_dimension("source"), &request).unwrap();
        assert_eq!(summary.rows["Google"], 3.0);
        assert_eq!(summary.total, 3.0);
        assert_eq!(summary.records, 3);
    }

    #[test]
    fn dimensions_outside_the_range_get_a_zero_row() {
        let records = vec![
            lead("2023-06-05", "Newspaper", true),
            lead("2024-01-05", "Google", true),
        ];
        let request = conversion_request(vec![key("2024-01"), key("2024-02")]);

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        assert_eq!(pivot.ordered_dimensions(), vec!["Google", "Newspaper"]);
        assert_eq!(
            pivot.rows["Newspaper"],
            BTreeMap::from([(key("2024-01"), 0.0), (key("2024-02"), 0.0)])
        );
        assert_eq!(pivot.row_totals["Newspaper"], 0.0);
        assert_eq!(pivot.totals[&key("2024-01")], 100.0);
    }

    #[test]
    fn row_totals_pool_across_months() {
        let records = vec![
            lead("2024-01-05", "Google", true),
            lead("2024-02-05", "Google", false),
            lead("2024-02-06", "Google", false),
            lead("2024-02-07", "Google", false),
            lead("2023-12-07", "Google", true),
        ];
        let request = conversion_request(vec![key("2024-01"), key("2024-02")]);

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();

        // 100% in January and 0% in February pool to 1 out of 4.
        assert_eq!(pivot.row_totals["Google"], 25.0);
        assert_eq!(pivot.grand_total, 25.0);
    }

    #[test]
    fn month_over_month_growth_uses_preceding_month() {
        let records = vec![
            lead("2023-12-01", "Google", false),
            lead("2024-01-01", "Google", false),
            lead("2024-01-02", "Google", false),
            lead("2024-02-01", "Google", false),
        ];
        let request = PivotRequest::new("count", vec![key("2024-01"), key("2024-02")])
            .rules(lead_rules())
            .with_growth();

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();
        let growth = pivot.growth.unwrap();

        assert_eq!(growth.rows["Google"][&key("2024-01")], 100.0);
        assert_eq!(growth.rows["Google"][&key("2024-02")], -50.0);
        assert_eq!(growth.totals[&key("2024-02")], -50.0);
    }

    #[test]
    fn year_over_year_growth_pairs_same_month() {
        let records = vec![
            lead("2024-01-10", "Google", false),
            lead("2024-01-11", "Google", false),
            lead("2025-01-10", "Google", false),
            lead("2025-02-10", "Google", false),
            lead("2025-02-11", "Referral", false),
        ];
        let request = PivotRequest::new("count", year_over_year_range(2024, 2025, 2).unwrap())
            .rules(lead_rules())
            .mode(ComparisonMode::YearOverYear {
                base_year: 2024,
                compare_year: 2025,
            })
            .with_growth();

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();
        let growth = pivot.growth.as_ref().unwrap();

        assert_eq!(growth.rows["Google"].len(), 2);
        assert_eq!(growth.rows["Google"][&key("2025-01")], -50.0);
        assert_eq!(growth.rows["Google"][&key("2025-02")], 100.0);
        assert_eq!(growth.rows["Referral"][&key("2025-01")], 0.0);
        assert_eq!(growth.totals[&key("2025-02")], 100.0);
        assert!(!growth.totals.contains_key(&key("2024-01")));

        let pairs = pivot.month_pairs("Google", 2024, 2025);
        assert_eq!(pairs.len(), 12);
        assert_eq!(pairs[0].label, "Jan");
        assert_eq!(pairs[0].base, 2.0);
        assert_eq!(pairs[0].compare, 1.0);
        assert_eq!(pairs[0].growth, -50.0);

        let total_pairs = pivot.month_pairs(TOTAL_LABEL, 2024, 2025);
        assert_eq!(total_pairs[1].compare, 2.0);
    }

    #[test]
    fn year_over_year_rejects_same_year() {
        let request = PivotRequest::new("count", vec![key("2024-01")]).mode(
            ComparisonMode::YearOverYear {
                base_year: 2024,
                compare_year: 2024,
            },
        );

        let result = compute_pivot(&[], by_dimension("source"), &request);

        assert!(matches!(result, Err(Error::InvalidComparison(_))));
    }

    #[test]
    fn unknown_metric_fails_before_processing() {
        let request = PivotRequest::new("totalLeadz", vec![key("2024-01")]);

        let result = compute_pivot(&[lead("2024-01-05", "Google", true)], by_dimension("source"), &request);

        assert_eq!(result, Err(Error::UnknownMetric("totalLeadz".to_owned())));
    }

    #[test]
    fn custom_metric_over_extra_counter() {
        let mut registry = MetricRegistry::new();
        registry.register(MetricDefinition::new(
            "noShowRate",
            ValueKind::Percentage,
            |accumulator| ratio(accumulator.extra("noShows"), accumulator.count as f64),
        ));
        let rules = CounterRules::new().extra_counter("noShows", |record| {
            if record.text_equals("status", "No Show") { 1.0 } else { 0.0 }
        });
        let records = vec![
            RawRecord::new()
                .with("date", "15/03/2024")
                .with("trainer", "Ana")
                .with("status", "No Show"),
            RawRecord::new()
                .with("date", "16/03/2024")
                .with("trainer", "Ana")
                .with("status", "Attended"),
        ];
        let request = PivotRequest::new("noShowRate", vec![key("2024-03")])
            .rules(rules)
            .registry(registry);

        let pivot = compute_pivot(&records, by_dimension("trainer"), &request).unwrap();

        assert_eq!(pivot.rows["Ana"][&key("2024-03")], 50.0);
    }

    #[test]
    fn empty_input_gives_zero_totals() {
        let request = conversion_request(vec![key("2024-01")]).with_growth();

        let pivot = compute_pivot(&[], by_dimension("source"), &request).unwrap();

        assert!(pivot.rows.is_empty());
        assert_eq!(pivot.totals, BTreeMap::from([(key("2024-01"), 0.0)]));
        assert_eq!(pivot.grand_total, 0.0);
    }

    #[test]
    fn pivots_can_be_computed_concurrently() {
        let records: Vec<RawRecord> = (1..=28)
            .map(|day| {
                let source = if day % 3 == 0 { "Google" } else { "Referral" };
                lead(&format!("2024-02-{day:02}"), source, day % 2 == 0)
            })
            .collect();
        let expected = compute_pivot(
            &records,
            by_dimension("source"),
            &conversion_request(vec![key("2024-02")]),
        )
        .unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        compute_pivot(
                            &records,
                            by_dimension("source"),
                            &conversion_request(vec![key("2024-02")]),
                        )
                        .unwrap()
                    })
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn serializes_buckets_as_month_strings() {
        let records = vec![lead("2024-01-05", "Google", true)];
        let request = conversion_request(vec![key("2024-01")]);

        let pivot = compute_pivot(&records, by_dimension("source"), &request).unwrap();
        let json = serde_json::to_value(&pivot).unwrap();

        assert_eq!(json["rows"]["Google"]["2024-01"], 100.0);
        assert_eq!(json["totals"]["2024-01"], 100.0);
        assert_eq!(json["buckets"][0], "2024-01");
        assert_eq!(json["kind"], "percentage");
        assert!(json.get("growth").is_none());
    }
}
