//! Grouping of normalised records into raw accumulators.
//!
//! Records are folded in a single pass into a map of
//! `dimension -> bucket -> RawAccumulator`. Which records count as converted,
//! trial or lost is decided by the caller through [CounterRules], so the same
//! fold serves leads, class sessions and sales alike.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    accumulator::RawAccumulator,
    bucket::BucketKey,
    record::{NormalizedRecord, UNKNOWN_LABEL},
};

/// Raw accumulators grouped by dimension, then by bucket.
pub type GroupedMap = BTreeMap<String, BTreeMap<BucketKey, RawAccumulator>>;

/// Decides whether a record should be counted by a counter.
pub type RecordPredicate = Arc<dyn Fn(&NormalizedRecord) -> bool + Send + Sync>;

/// A named, caller-defined counter.
#[derive(Clone)]
pub struct ExtraCounter {
    /// The name the counter is stored under in [RawAccumulator::extra].
    pub name: String,
    /// The amount a record adds to the counter.
    pub value: Arc<dyn Fn(&NormalizedRecord) -> f64 + Send + Sync>,
}

/// The rules for turning a record into counter increments.
///
/// Every record increments `count`. The amount field, if set, is added to
/// `sum_amount`. The converted, trial and lost counters are incremented when
/// their predicate matches the record.
#[derive(Clone)]
pub struct CounterRules {
    /// The numeric field summed into `sum_amount`.
    pub amount_field: Option<String>,
    /// Matches records that count as converted.
    pub converted: Option<RecordPredicate>,
    /// Matches records that reached the trial stage.
    pub trial: Option<RecordPredicate>,
    /// Matches records that count as lost.
    pub lost: Option<RecordPredicate>,
    /// Additional domain-specific counters.
    pub extra: Vec<ExtraCounter>,
}

impl Default for CounterRules {
    fn default() -> Self {
        Self {
            amount_field: Some("amount".to_owned()),
            converted: None,
            trial: None,
            lost: None,
            extra: Vec::new(),
        }
    }
}

impl CounterRules {
    /// Rules that only count records and sum the `amount` field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum `field` into `sum_amount`.
    pub fn amount(mut self, field: &str) -> Self {
        self.amount_field = Some(field.to_owned());
        self
    }

    /// Do not sum any field into `sum_amount`.
    pub fn without_amount(mut self) -> Self {
        self.amount_field = None;
        self
    }

    /// Count records matching `predicate` as converted.
    pub fn converted_when(
        mut self,
        predicate: impl Fn(&NormalizedRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.converted = Some(Arc::new(predicate));
        self
    }

    /// Count records matching `predicate` as having reached the trial stage.
    pub fn trial_when(
        mut self,
        predicate: impl Fn(&NormalizedRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.trial = Some(Arc::new(predicate));
        self
    }

    /// Count records matching `predicate` as lost.
    pub fn lost_when(
        mut self,
        predicate: impl Fn(&NormalizedRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.lost = Some(Arc::new(predicate));
        self
    }

    /// Add a named counter that accumulates `value` for every record.
    pub fn extra_counter(
        mut self,
        name: &str,
        value: impl Fn(&NormalizedRecord) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.extra.push(ExtraCounter {
            name: name.to_owned(),
            value: Arc::new(value),
        });
        self
    }

    /// Add the contribution of `record` to `accumulator`.
    pub fn accumulate(&self, accumulator: &mut RawAccumulator, record: &NormalizedRecord) {
        accumulator.count += 1;

        if let Some(field) = &self.amount_field {
            accumulator.sum_amount += record.number(field);
        }

        let matches = |predicate: &Option<RecordPredicate>| {
            predicate.as_ref().is_some_and(|predicate| predicate(record))
        };

        if matches(&self.converted) {
            accumulator.count_converted += 1;
        }
        if matches(&self.trial) {
            accumulator.count_trial += 1;
        }
        if matches(&self.lost) {
            accumulator.count_lost += 1;
        }

        for counter in &self.extra {
            *accumulator.extra.entry(counter.name.clone()).or_insert(0.0) +=
                (counter.value)(record);
        }
    }
}

/// Matches records whose `field` is a true flag (`true`, `yes`, `1`, ...).
pub fn flag_is(field: &str) -> impl Fn(&NormalizedRecord) -> bool + Send + Sync + 'static {
    let field = field.to_owned();
    move |record| record.flag(&field)
}

/// Matches records whose `field` equals `expected`, ignoring case.
pub fn field_equals(
    field: &str,
    expected: &str,
) -> impl Fn(&NormalizedRecord) -> bool + Send + Sync + 'static {
    let field = field.to_owned();
    let expected = expected.to_owned();
    move |record| record.text_equals(&field, &expected)
}

/// Keys records by the value of `field`, see [NormalizedRecord::dimension].
pub fn by_dimension(field: &str) -> impl Fn(&NormalizedRecord) -> String + Send + Sync + 'static {
    let field = field.to_owned();
    move |record| record.dimension(&field)
}

/// Keys records by the calendar month of their date, `None` for undated
/// records.
pub fn by_month(record: &NormalizedRecord) -> Option<BucketKey> {
    record.date().map(BucketKey::from_date)
}

/// Folds `records` into accumulators grouped by dimension and bucket.
///
/// Records for which `bucket_key` returns `None` cannot be placed in a bucket
/// and are skipped. Dimension keys that are blank are grouped under
/// [UNKNOWN_LABEL]. Each record is visited exactly once.
pub fn aggregate<D, B>(
    records: &[NormalizedRecord],
    dimension_key: D,
    bucket_key: B,
    rules: &CounterRules,
) -> GroupedMap
where
    D: Fn(&NormalizedRecord) -> String,
    B: Fn(&NormalizedRecord) -> Option<BucketKey>,
{
    let mut grouped = GroupedMap::new();

    for record in records {
        let Some(bucket) = bucket_key(record) else {
            continue;
        };

        let accumulator = grouped
            .entry(canonical_dimension(dimension_key(record)))
            .or_default()
            .entry(bucket)
            .or_default();

        rules.accumulate(accumulator, record);
    }

    grouped
}

/// Folds every record, dated or not, into one accumulator per dimension.
pub fn aggregate_undated<D>(
    records: &[NormalizedRecord],
    dimension_key: D,
    rules: &CounterRules,
) -> BTreeMap<String, RawAccumulator>
where
    D: Fn(&NormalizedRecord) -> String,
{
    let mut grouped: BTreeMap<String, RawAccumulator> = BTreeMap::new();

    for record in records {
        let accumulator = grouped
            .entry(canonical_dimension(dimension_key(record)))
            .or_default();

        rules.accumulate(accumulator, record);
    }

    grouped
}

fn canonical_dimension(key: String) -> String {
    let trimmed = key.trim();

    if trimmed.is_empty() {
        UNKNOWN_LABEL.to_owned()
    } else if trimmed.len() == key.len() {
        key
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bucket::BucketKey,
        record::{NormalizeOptions, NormalizedRecord, RawRecord, UNKNOWN_LABEL, normalize},
    };

    use super::{
        CounterRules, aggregate, aggregate_undated, by_dimension, by_month, field_equals, flag_is,
    };

    fn lead(date: &str, source: &str, stage: &str, amount: f64) -> NormalizedRecord {
        let raw = RawRecord::new()
            .with("date", date)
            .with("source", source)
            .with("stage", stage)
            .with("amount", amount);
        normalize(&raw, &NormalizeOptions::default())
    }

    fn key(text: &str) -> BucketKey {
        BucketKey::parse(text).unwrap()
    }

    fn lead_rules() -> CounterRules {
        CounterRules::new()
            .converted_when(field_equals("stage", "Member"))
            .trial_when(|record| {
                record.text_equals("stage", "Trial Completed")
                    || record.text_equals("stage", "Member")
            })
            .lost_when(field_equals("stage", "Lost"))
    }

    #[test]
    fn groups_by_dimension_and_month() {
        let records = vec![
            lead("2024-01-05", "Google", "Member", 100.0),
            lead("2024-01-20", "Google", "Lost", 0.0),
            lead("2024-02-01", "Referral", "Trial Completed", 50.0),
        ];

        let grouped = aggregate(&records, by_dimension("source"), by_month, &lead_rules());

        assert_eq!(grouped.len(), 2);

        let google = &grouped["Google"][&key("2024-01")];
        assert_eq!(google.count, 2);
        assert_eq!(google.count_converted, 1);
        assert_eq!(google.count_trial, 1);
        assert_eq!(google.count_lost, 1);
        assert_eq!(google.sum_amount, 100.0);

        let referral = &grouped["Referral"][&key("2024-02")];
        assert_eq!(referral.count, 1);
        assert_eq!(referral.count_trial, 1);
        assert_eq!(referral.count_converted, 0);
        assert!(!grouped["Google"].contains_key(&key("2024-02")));
    }

    #[test]
    fn skips_records_without_a_bucket() {
        let records = vec![
            lead("garbage", "Google", "Member", 10.0),
            lead("2024-01-05", "Google", "Member", 10.0),
        ];

        let grouped = aggregate(&records, by_dimension("source"), by_month, &lead_rules());

        assert_eq!(grouped["Google"][&key("2024-01")].count, 1);
    }

    #[test]
    fn blank_dimension_keys_are_grouped_as_unknown() {
        let records = vec![
            lead("2024-01-05", "", "Member", 0.0),
            lead("2024-01-06", "Google", "Member", 0.0),
        ];

        let grouped = aggregate(
            &records,
            |record: &NormalizedRecord| {
                if record.dimension("source") == "Google" {
                    "Google".to_owned()
                } else {
                    "  ".to_owned()
                }
            },
            by_month,
            &lead_rules(),
        );

        assert_eq!(grouped[UNKNOWN_LABEL][&key("2024-01")].count, 1);
        assert_eq!(grouped["Google"][&key("2024-01")].count, 1);
    }

    #[test]
    fn flag_predicates_and_extra_counters() {
        let raw = [
            RawRecord::new()
                .with("date", "2024-03-01")
                .with("trainer", "Ana")
                .with("isConverted", "yes")
                .with("attendees", "12"),
            RawRecord::new()
                .with("date", "2024-03-02")
                .with("trainer", "Ana")
                .with("isConverted", "no")
                .with("attendees", "3"),
        ];
        let records: Vec<_> = raw
            .iter()
            .map(|record| normalize(record, &NormalizeOptions::default()))
            .collect();
        let rules = CounterRules::new()
            .without_amount()
            .converted_when(flag_is("isConverted"))
            .extra_counter("attendees", |record| record.number("attendees"));

        let grouped = aggregate(&records, by_dimension("trainer"), by_month, &rules);

        let cell = &grouped["Ana"][&key("2024-03")];
        assert_eq!(cell.count, 2);
        assert_eq!(cell.count_converted, 1);
        assert_eq!(cell.extra("attendees"), 15.0);
        assert_eq!(cell.sum_amount, 0.0);
    }

    #[test]
    fn undated_aggregation_includes_every_record() {
        let records = vec![
            lead("garbage", "Google", "Member", 10.0),
            lead("2024-01-05", "Google", "Lost", 5.0),
        ];

        let grouped = aggregate_undated(&records, by_dimension("source"), &lead_rules());

        assert_eq!(grouped["Google"].count, 2);
        assert_eq!(grouped["Google"].count_converted, 1);
        assert_eq!(grouped["Google"].sum_amount, 15.0);
    }
}
