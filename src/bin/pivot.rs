use std::{
    error::Error,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use pivoteur_rs::{
    AnnotationStore, BucketKey, ComparisonMode, CounterRules, InputFormat, PivotRequest,
    PivotResult, RecordPredicate, SQLiteAnnotationStore, Summary, TOTAL_LABEL, by_dimension,
    compute_pivot, field_equals, flag_is, format_percentage, format_value, months_between,
    read_records_from_path, setup_logging, summarize, today_in_timezone, trailing_months,
    year_over_year_range,
};

/// Pivot dated business records by a dimension and calendar month.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log debug messages to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write debug logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a metric per dimension and month.
    Compute(ComputeArgs),

    /// Compute a metric per dimension over all records, ignoring dates.
    Summary(SourceArgs),

    /// Read and write the insight text attached to saved views.
    Insight {
        /// File path to the insight SQLite database.
        #[arg(long)]
        db_path: PathBuf,

        #[command(subcommand)]
        action: InsightAction,
    },
}

/// Where the records come from and how they are counted.
#[derive(Args, Debug)]
struct SourceArgs {
    /// The CSV or JSON file to read records from.
    input: PathBuf,

    /// The input format, guessed from the file extension if omitted.
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// The field holding each record's date.
    #[arg(long, default_value = "date")]
    date_field: String,

    /// The field to group records by.
    #[arg(short, long)]
    dimension: String,

    /// The field summed for the `sum` and `averagePerRecord` metrics.
    #[arg(long, default_value = "amount")]
    amount: String,

    /// Records counted as converted, either a flag field `FIELD` or `FIELD=VALUE`.
    #[arg(long)]
    converted: Option<String>,

    /// Records counted as reaching the trial stage, `FIELD` or `FIELD=VALUE`.
    #[arg(long)]
    trial: Option<String>,

    /// Records counted as lost, `FIELD` or `FIELD=VALUE`.
    #[arg(long)]
    lost: Option<String>,

    /// The metric to compute.
    #[arg(short, long, default_value = "count")]
    metric: String,

    /// How to print the result.
    #[arg(short, long, value_enum, default_value_t = Output::Table)]
    output: Output,
}

#[derive(Args, Debug)]
struct ComputeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Show the trailing N months ending at the current month.
    #[arg(long, default_value_t = 12)]
    months: usize,

    /// The timezone used to decide the current month.
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// The first month of an explicit range, e.g. 2024-01.
    #[arg(long, requires = "to", conflicts_with = "base_year")]
    from: Option<String>,

    /// The last month of an explicit range, e.g. 2024-12.
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Compare the months of this year with `--compare-year`.
    #[arg(long, requires = "compare_year")]
    base_year: Option<i32>,

    /// The year compared with `--base-year`.
    #[arg(long, requires = "base_year")]
    compare_year: Option<i32>,

    /// The last month of the compare year to show.
    #[arg(long, default_value_t = 12)]
    through_month: u8,

    /// Also compute growth.
    #[arg(short, long)]
    growth: bool,
}

#[derive(Subcommand, Debug)]
enum InsightAction {
    /// Print the insight for a view.
    Get { view_id: String },
    /// Set the insight for a view, replacing any existing text.
    Set { view_id: String, text: String },
    /// Delete the insight for a view.
    Delete { view_id: String },
    /// Print every insight.
    List,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for InputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => InputFormat::Csv,
            Format::Json => InputFormat::Json,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Table,
    Json,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Compute(args) => run_compute(args)?,
        Command::Summary(args) => run_summary(args)?,
        Command::Insight { db_path, action } => run_insight(db_path, action)?,
    }

    Ok(())
}

fn run_compute(args: ComputeArgs) -> Result<(), pivoteur_rs::Error> {
    let (buckets, mode) = resolve_range(&args)?;
    let source = &args.source;

    let records = read_records_from_path(&source.input, source.format.map(InputFormat::from))?;
    let mut request = PivotRequest::new(&source.metric, buckets)
        .mode(mode)
        .rules(counter_rules(source))
        .timestamp_field(&source.date_field);

    if args.growth {
        request = request.with_growth();
    }

    let result = compute_pivot(&records, by_dimension(&source.dimension), &request)?;

    if result.undated_records > 0 {
        tracing::warn!(
            "{} records had no usable {} and were left out",
            result.undated_records,
            source.date_field
        );
    }

    match source.output {
        Output::Json => println!("{}", to_json(&result)?),
        Output::Table => print_pivot(&result),
    }

    Ok(())
}

fn run_summary(args: SourceArgs) -> Result<(), pivoteur_rs::Error> {
    let records = read_records_from_path(&args.input, args.format.map(InputFormat::from))?;
    let request = PivotRequest::new(&args.metric, Vec::new())
        .rules(counter_rules(&args))
        .timestamp_field(&args.date_field);

    let summary = summarize(&records, by_dimension(&args.dimension), &request)?;

    match args.output {
        Output::Json => println!("{}", to_json(&summary)?),
        Output::Table => print_summary(&summary),
    }

    Ok(())
}

fn run_insight(db_path: PathBuf, action: InsightAction) -> Result<(), pivoteur_rs::Error> {
    let connection = Connection::open(&db_path)?;
    let store = SQLiteAnnotationStore::new(Arc::new(Mutex::new(connection)))?;

    match action {
        InsightAction::Get { view_id } => println!("{}", store.get(&view_id)?.text),
        InsightAction::Set { view_id, text } => {
            store.save(&view_id, &text)?;
            tracing::info!("Saved insight for {view_id}");
        }
        InsightAction::Delete { view_id } => store.delete(&view_id)?,
        InsightAction::List => {
            for annotation in store.get_all()? {
                println!("{}\t{}", annotation.view_id, annotation.text);
            }
        }
    }

    Ok(())
}

fn resolve_range(args: &ComputeArgs) -> Result<(Vec<BucketKey>, ComparisonMode), pivoteur_rs::Error> {
    if let (Some(base_year), Some(compare_year)) = (args.base_year, args.compare_year) {
        let buckets = year_over_year_range(base_year, compare_year, args.through_month)?;
        let mode = ComparisonMode::YearOverYear {
            base_year,
            compare_year,
        };

        return Ok((buckets, mode));
    }

    let buckets = match (&args.from, &args.to) {
        (Some(from), Some(to)) => months_between(BucketKey::parse(from)?, BucketKey::parse(to)?),
        _ => {
            let today = today_in_timezone(&args.timezone)?;
            trailing_months(BucketKey::from_date(today), args.months)
        }
    };

    Ok((buckets, ComparisonMode::MonthOverMonth))
}

fn counter_rules(args: &SourceArgs) -> CounterRules {
    let mut rules = CounterRules::new().amount(&args.amount);
    rules.converted = args.converted.as_deref().map(parse_rule);
    rules.trial = args.trial.as_deref().map(parse_rule);
    rules.lost = args.lost.as_deref().map(parse_rule);
    rules
}

/// `FIELD=VALUE` matches a value, a bare `FIELD` matches a true flag.
fn parse_rule(rule: &str) -> RecordPredicate {
    match rule.split_once('=') {
        Some((field, expected)) => Arc::new(field_equals(field.trim(), expected.trim())),
        None => Arc::new(flag_is(rule.trim())),
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<String, pivoteur_rs::Error> {
    serde_json::to_string_pretty(value)
        .map_err(|error| pivoteur_rs::Error::JSONSerializationError(error.to_string()))
}

fn print_pivot(result: &PivotResult) {
    let mut header = vec!["".to_owned()];
    header.extend(result.buckets.iter().map(BucketKey::to_string));
    header.push("Total".to_owned());

    let mut table = vec![header];

    for dimension in result.ordered_dimensions() {
        let mut line = vec![dimension.to_owned()];
        line.extend(
            result
                .buckets
                .iter()
                .map(|bucket| format_value(result.value(dimension, *bucket).unwrap_or(0.0), result.kind)),
        );
        line.push(format_value(
            result.row_totals.get(dimension).copied().unwrap_or(0.0),
            result.kind,
        ));
        table.push(line);
    }

    let mut totals_line = vec![TOTAL_LABEL.to_owned()];
    totals_line.extend(result.buckets.iter().map(|bucket| {
        format_value(result.totals.get(bucket).copied().unwrap_or(0.0), result.kind)
    }));
    totals_line.push(format_value(result.grand_total, result.kind));
    table.push(totals_line);

    if let Some(growth) = &result.growth {
        let mut growth_line = vec!["Growth".to_owned()];
        growth_line.extend(result.buckets.iter().map(|bucket| {
            growth
                .totals
                .get(bucket)
                .map_or_else(String::new, |value| format_percentage(*value))
        }));
        growth_line.push(String::new());
        table.push(growth_line);
    }

    print_table(&table);
}

fn print_summary(summary: &Summary) {
    let mut table = vec![vec!["".to_owned(), summary.metric.clone()]];

    for (dimension, value) in &summary.rows {
        table.push(vec![dimension.clone(), format_value(*value, summary.kind)]);
    }

    table.push(vec![
        TOTAL_LABEL.to_owned(),
        format_value(summary.total, summary.kind),
    ]);

    print_table(&table);
}

/// Prints `table` with the first column left aligned and the rest right
/// aligned.
fn print_table(table: &[Vec<String>]) {
    let column_count = table.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..column_count)
        .map(|column| {
            table
                .iter()
                .filter_map(|line| line.get(column))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for line in table {
        let cells: Vec<String> = line
            .iter()
            .enumerate()
            .map(|(column, cell)| {
                if column == 0 {
                    format!("{cell:<width$}", width = widths[column])
                } else {
                    format!("{cell:>width$}", width = widths[column])
                }
            })
            .collect();

        println!("{}", cells.join("  "));
    }
}
