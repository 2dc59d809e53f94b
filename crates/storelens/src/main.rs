use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use polars::prelude::DataFrame;
use storelens_core::aggregates::{
    daily_revenue, preview, rating_distribution, revenue_by_category, revenue_by_payment_method,
    summary, weekday_hour_matrix,
};
use storelens_core::filter::{
    apply_filter, date_bounds, distinct_branches, distinct_categories, FilterSelection,
};
use storelens_core::schema::HOURS_PER_DAY;
use storelens_core::{load_transactions, DatasetStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Retail transactions analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Overall revenue, rating, and transaction-count metrics
    Summary(QueryArgs),
    /// Revenue grouped by product category
    Category(QueryArgs),
    /// Revenue grouped by calendar date
    Daily(QueryArgs),
    /// Revenue pivoted into a weekday-by-hour matrix
    Heatmap(QueryArgs),
    /// Revenue grouped by payment method
    Payments(QueryArgs),
    /// Rating distribution per branch
    Ratings(QueryArgs),
    /// First rows of the filtered table plus the row count
    Preview(PreviewArgs),
    /// Available branches, categories, and date bounds for filtering
    Options(DataArgs),
    /// Load the dataset and print the cleaning report
    Check(DataArgs),
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Path to the transactions CSV (defaults to $STORELENS_DATA)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[command(flatten)]
    data: DataArgs,
    /// Restrict to these branches (repeatable)
    #[arg(long = "branch")]
    branches: Vec<String>,
    /// Restrict to these categories (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Earliest date to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest date to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    query: QueryArgs,
    /// How many rows to show
    #[arg(long, default_value_t = 5)]
    rows: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Summary(args) => handle_summary(args),
        Command::Category(args) => handle_category(args),
        Command::Daily(args) => handle_daily(args),
        Command::Heatmap(args) => handle_heatmap(args),
        Command::Payments(args) => handle_payments(args),
        Command::Ratings(args) => handle_ratings(args),
        Command::Preview(args) => handle_preview(args),
        Command::Options(args) => handle_options(args),
        Command::Check(args) => handle_check(args),
    }
}

fn resolve_data_path(args: &DataArgs) -> Result<PathBuf> {
    if let Some(path) = &args.data {
        return Ok(path.clone());
    }
    env::var("STORELENS_DATA")
        .map(PathBuf::from)
        .context("pass --data or set STORELENS_DATA to the transactions CSV")
}

/// Loads the cached table and derives the requested view. `None` means a
/// warning was already printed and there is nothing to render.
fn load_filtered(args: &QueryArgs) -> Result<Option<DataFrame>> {
    let path = resolve_data_path(&args.data)?;
    info!(source = %path.display(), "loading transactions dataset");
    let mut store = DatasetStore::new(path);

    let report = store.report()?.clone();
    if report.missing_source {
        println!(
            "{}",
            warning_payload(
                args.data.json,
                &format!("No data loaded: '{}' does not exist.", report.source),
            )
        );
        return Ok(None);
    }

    let selection = FilterSelection {
        branches: none_if_empty(&args.branches),
        categories: none_if_empty(&args.categories),
        start_date: args.from,
        end_date: args.to,
    };
    let filtered = apply_filter(store.table()?, &selection)?;

    if filtered.height() == 0 {
        println!(
            "{}",
            warning_payload(args.data.json, "No data matches the current filters.")
        );
        return Ok(None);
    }

    Ok(Some(filtered))
}

/// Warnings go to stdout either way; with `--json` they become a one-field
/// object so machine consumers never see bare prose.
fn warning_payload(json: bool, message: &str) -> String {
    if json {
        serde_json::json!({ "warning": message }).to_string()
    } else {
        format!("⚠️  {message}")
    }
}

fn none_if_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

fn handle_summary(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let metrics = summary(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    let mut table = new_table(vec!["metric", "value"]);
    table.add_row(vec![
        "total_revenue".to_string(),
        format!("{:.2}", metrics.total_revenue),
    ]);
    table.add_row(vec![
        "average_rating".to_string(),
        metrics
            .average_rating
            .map_or_else(|| "n/a".to_string(), |rating| format!("{rating:.2}")),
    ]);
    table.add_row(vec![
        "transactions".to_string(),
        metrics.transactions.to_string(),
    ]);
    println!("{table}");
    Ok(())
}

fn handle_category(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let rows = revenue_by_category(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = new_table(vec!["category", "revenue"]);
    for row in &rows {
        table.add_row(vec![row.category.clone(), format!("{:.2}", row.revenue)]);
    }
    println!("{table}");
    Ok(())
}

fn handle_daily(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let rows = daily_revenue(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = new_table(vec!["date", "revenue"]);
    for row in &rows {
        table.add_row(vec![row.date.to_string(), format!("{:.2}", row.revenue)]);
    }
    println!("{table}");
    Ok(())
}

fn handle_heatmap(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let matrix = weekday_hour_matrix(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    let mut header = vec!["weekday".to_string()];
    header.extend((0..HOURS_PER_DAY).map(|hour| format!("{hour:02}")));
    let mut table = new_table(header.iter().map(String::as_str).collect());

    for (weekday, cells) in matrix.weekdays.iter().zip(&matrix.cells) {
        let mut row = vec![weekday.to_string()];
        row.extend(cells.iter().map(|cell| {
            cell.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
        }));
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

fn handle_payments(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let rows = revenue_by_payment_method(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = new_table(vec!["payment_method", "revenue"]);
    for row in &rows {
        table.add_row(vec![
            row.payment_method.clone(),
            format!("{:.2}", row.revenue),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn handle_ratings(args: QueryArgs) -> Result<()> {
    let Some(df) = load_filtered(&args)? else {
        return Ok(());
    };
    let rows = rating_distribution(&df)?;

    if args.data.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = new_table(vec![
        "branch", "count", "mean", "min", "q1", "median", "q3", "max",
    ]);
    for row in &rows {
        table.add_row(vec![
            row.branch.clone(),
            row.count.to_string(),
            format!("{:.2}", row.mean),
            format!("{:.2}", row.min),
            format!("{:.2}", row.q1),
            format!("{:.2}", row.median),
            format!("{:.2}", row.q3),
            format!("{:.2}", row.max),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn handle_preview(args: PreviewArgs) -> Result<()> {
    let Some(df) = load_filtered(&args.query)? else {
        return Ok(());
    };
    let rows = preview(&df, args.rows)?;

    if args.query.data.json {
        let payload = serde_json::json!({
            "rows_available": df.height(),
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut table = new_table(vec![
        "branch",
        "category",
        "date",
        "time",
        "unit_price",
        "quantity",
        "rating",
        "payment_method",
        "hour",
        "weekday",
        "total",
    ]);
    for row in &rows {
        table.add_row(vec![
            row.branch.clone(),
            row.category.clone(),
            row.date.to_string(),
            row.time.clone(),
            format!("{:.2}", row.unit_price),
            row.quantity.to_string(),
            row.rating
                .map_or_else(|| "n/a".to_string(), |rating| format!("{rating:.1}")),
            row.payment_method.clone(),
            row.hour.to_string(),
            row.weekday.clone(),
            format!("{:.2}", row.total),
        ]);
    }
    println!("{table}");
    println!("Rows available: {}", df.height());
    Ok(())
}

fn handle_options(args: DataArgs) -> Result<()> {
    let path = resolve_data_path(&args)?;
    let mut store = DatasetStore::new(path);

    let report = store.report()?.clone();
    if report.missing_source {
        println!(
            "{}",
            warning_payload(
                args.json,
                &format!("No data loaded: '{}' does not exist.", report.source),
            )
        );
        return Ok(());
    }

    let table = store.table()?;
    let branches = distinct_branches(table)?;
    let categories = distinct_categories(table)?;
    let bounds = date_bounds(table)?;

    if args.json {
        let payload = serde_json::json!({
            "branches": branches,
            "categories": categories,
            "date_bounds": bounds,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut table_out = new_table(vec!["option", "values"]);
    table_out.add_row(vec!["branches".to_string(), branches.join(", ")]);
    table_out.add_row(vec!["categories".to_string(), categories.join(", ")]);
    table_out.add_row(vec![
        "date_bounds".to_string(),
        bounds.map_or_else(
            || "n/a".to_string(),
            |(lo, hi)| format!("{lo} to {hi}"),
        ),
    ]);
    println!("{table_out}");
    Ok(())
}

fn handle_check(args: DataArgs) -> Result<()> {
    let path = resolve_data_path(&args)?;
    let outcome = load_transactions(&path)?;
    let report = &outcome.report;

    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.missing_source {
        println!("⚠️  No data loaded: '{}' does not exist.", report.source);
        return Ok(());
    }

    let mut table = new_table(vec!["field", "value"]);
    table.add_row(vec!["source".to_string(), report.source.clone()]);
    table.add_row(vec!["rows_read".to_string(), report.rows_read.to_string()]);
    table.add_row(vec!["rows_kept".to_string(), report.rows_kept.to_string()]);
    table.add_row(vec![
        "rows_dropped_datetime".to_string(),
        report.rows_dropped_datetime.to_string(),
    ]);
    table.add_row(vec![
        "rows_dropped_numeric".to_string(),
        report.rows_dropped_numeric.to_string(),
    ]);
    println!("{table}");

    if report.rows_dropped() > 0 {
        println!(
            "⚠️  {} of {} rows failed cleaning and were dropped.",
            report.rows_dropped(),
            report.rows_read
        );
    } else {
        println!("✅ Every row survived cleaning.");
    }
    Ok(())
}
