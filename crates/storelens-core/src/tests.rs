use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use crate::aggregates::{
    daily_revenue, preview, rating_distribution, revenue_by_category, revenue_by_payment_method,
    summary, weekday_hour_matrix,
};
use crate::error::DatasetError;
use crate::filter::{
    apply_filter, date_bounds, distinct_branches, distinct_categories, FilterSelection,
};
use crate::loader::load_transactions;
use crate::schema::{
    CLEANED_COLUMNS, COL_DATE, COL_HOUR, COL_QUANTITY, COL_TOTAL, COL_UNIT_PRICE, WEEKDAYS,
};
use crate::store::DatasetStore;

const EPSILON: f64 = 1e-9;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn load_small() -> DataFrame {
    load_transactions(fixture("retail_small.csv"))
        .expect("fixture load failed")
        .table
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("invalid test date")
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn cleans_small_fixture_and_counts_drops() {
    let outcome = load_transactions(fixture("retail_small.csv")).expect("fixture load failed");

    assert!(!outcome.report.missing_source);
    assert_eq!(outcome.report.rows_read, 8);
    assert_eq!(outcome.report.rows_kept, 4);
    assert_eq!(outcome.report.rows_dropped_datetime, 2);
    assert_eq!(outcome.report.rows_dropped_numeric, 2);
    assert_eq!(outcome.table.height(), 4);
    assert_eq!(outcome.table.get_column_names(), CLEANED_COLUMNS);
}

#[test]
fn strips_currency_symbol_and_recomputes_total() {
    let table = load_small();
    let unit_price = table.column(COL_UNIT_PRICE).unwrap().f64().unwrap();
    let total = table.column(COL_TOTAL).unwrap().f64().unwrap();

    assert_close(unit_price.get(0).unwrap(), 12.50);
    assert_close(total.get(0).unwrap(), 37.50);
}

#[test]
fn total_equals_unit_price_times_quantity_for_every_row() {
    let table = load_small();
    let unit_price = table.column(COL_UNIT_PRICE).unwrap().f64().unwrap();
    let quantity = table.column(COL_QUANTITY).unwrap().f64().unwrap();
    let total = table.column(COL_TOTAL).unwrap().f64().unwrap();

    for idx in 0..table.height() {
        let expected = unit_price.get(idx).unwrap() * quantity.get(idx).unwrap();
        assert_close(total.get(idx).unwrap(), expected);
    }
}

#[test]
fn cleaned_rows_carry_no_nulls_in_retention_columns() {
    let table = load_small();
    for column in [COL_DATE, COL_HOUR, COL_UNIT_PRICE, COL_QUANTITY] {
        assert_eq!(
            table.column(column).unwrap().null_count(),
            0,
            "column {column} held nulls after cleaning"
        );
    }
}

#[test]
fn missing_file_yields_empty_table_not_error() {
    let outcome =
        load_transactions(fixture("does_not_exist.csv")).expect("missing file must not error");

    assert!(outcome.report.missing_source);
    assert_eq!(outcome.table.height(), 0);
    assert_eq!(outcome.report.rows_read, 0);
}

#[test]
fn structurally_missing_column_is_rejected() {
    let err = load_transactions(fixture("missing_column.csv"))
        .expect_err("a file without a required column must be rejected");
    match err {
        DatasetError::MissingColumn(name) => assert_eq!(name, "rating"),
        other => panic!("unexpected error variant: {other}"),
    }
}

#[test]
fn ragged_rows_are_dropped_not_fatal() {
    let outcome =
        load_transactions(fixture("ragged_rows.csv")).expect("ragged row fixture failed to load");

    // short rows lose their trailing fields and fall out through the usual
    // per-field drops; long rows keep their leading fields
    assert_eq!(outcome.report.rows_read, 4);
    assert_eq!(outcome.report.rows_kept, 2);
    assert_eq!(outcome.report.rows_dropped_datetime, 1);
    assert_eq!(outcome.report.rows_dropped_numeric, 1);

    let total = outcome.table.column(COL_TOTAL).unwrap().f64().unwrap();
    assert_close(total.get(0).unwrap(), 37.5);
    assert_close(total.get(1).unwrap(), 5.0);
}

#[test]
fn filter_by_branch_keeps_matching_rows() {
    let table = load_small();
    let selection = FilterSelection {
        branches: Some(vec!["A".to_string()]),
        ..FilterSelection::default()
    };
    let view = apply_filter(&table, &selection).unwrap();
    assert_eq!(view.height(), 2);
    // source table untouched
    assert_eq!(table.height(), 4);
}

#[test]
fn filter_matching_nothing_yields_empty_view() {
    let table = load_small();
    let selection = FilterSelection {
        branches: Some(vec!["Z".to_string()]),
        ..FilterSelection::default()
    };
    let view = apply_filter(&table, &selection).unwrap();
    assert_eq!(view.height(), 0);
}

#[test]
fn filter_date_range_is_inclusive() {
    let table = load_small();
    let selection = FilterSelection {
        start_date: Some(date(2019, 1, 7)),
        end_date: Some(date(2019, 1, 8)),
        ..FilterSelection::default()
    };
    let view = apply_filter(&table, &selection).unwrap();
    assert_eq!(view.height(), 3);
}

#[test]
fn filter_combines_branch_category_and_dates() {
    let table = load_small();
    let selection = FilterSelection {
        branches: Some(vec!["A".to_string(), "B".to_string()]),
        categories: Some(vec!["Food".to_string()]),
        start_date: Some(date(2019, 1, 7)),
        end_date: Some(date(2019, 1, 7)),
    };
    let view = apply_filter(&table, &selection).unwrap();
    assert_eq!(view.height(), 1);
}

#[test]
fn date_bounds_span_the_cleaned_table() {
    let table = load_small();
    let bounds = date_bounds(&table).unwrap().expect("bounds expected");
    assert_eq!(bounds, (date(2019, 1, 7), date(2019, 1, 13)));
}

#[test]
fn distinct_labels_are_sorted() {
    let table = load_small();
    assert_eq!(distinct_branches(&table).unwrap(), vec!["A", "B"]);
    assert_eq!(
        distinct_categories(&table).unwrap(),
        vec!["Drinks", "Food", "Home"]
    );
}

#[test]
fn summary_metrics_over_small_fixture() {
    let table = load_small();
    let metrics = summary(&table).unwrap();

    assert_close(metrics.total_revenue, 65.0);
    assert_eq!(metrics.transactions, 4);
    // one kept row has an unparseable rating; the mean ignores it
    assert_close(metrics.average_rating.unwrap(), (7.0 + 6.5 + 8.0) / 3.0);
}

#[test]
fn category_revenue_partitions_the_total() {
    let table = load_small();
    let by_category = revenue_by_category(&table).unwrap();
    let metrics = summary(&table).unwrap();

    let partition_sum: f64 = by_category.iter().map(|entry| entry.revenue).sum();
    assert_close(partition_sum, metrics.total_revenue);

    let categories: Vec<&str> = by_category
        .iter()
        .map(|entry| entry.category.as_str())
        .collect();
    assert_eq!(categories, vec!["Drinks", "Food", "Home"]);
}

#[test]
fn daily_revenue_sorted_by_date() {
    let table = load_small();
    let daily = daily_revenue(&table).unwrap();

    assert_eq!(daily.len(), 3);
    assert_eq!(daily[0].date, date(2019, 1, 7));
    assert_close(daily[0].revenue, 45.5);
    assert_eq!(daily[1].date, date(2019, 1, 8));
    assert_close(daily[1].revenue, 5.0);
    assert_eq!(daily[2].date, date(2019, 1, 13));
    assert_close(daily[2].revenue, 14.5);
}

#[test]
fn payment_revenue_partitions_the_total() {
    let table = load_small();
    let by_payment = revenue_by_payment_method(&table).unwrap();

    let partition_sum: f64 = by_payment.iter().map(|entry| entry.revenue).sum();
    assert_close(partition_sum, 65.0);

    let cash = by_payment
        .iter()
        .find(|entry| entry.payment_method == "Cash")
        .expect("cash bucket expected");
    assert_close(cash.revenue, 52.0);
}

#[test]
fn heatmap_rows_fixed_monday_to_sunday() {
    // fixture rows arrive Sunday first; the matrix order must not follow them
    let outcome = load_transactions(fixture("weekday_order.csv")).unwrap();
    let matrix = weekday_hour_matrix(&outcome.table).unwrap();

    assert_eq!(matrix.weekdays, WEEKDAYS);
    assert_close(matrix.cell("Monday", 11).unwrap(), 2.0);
    assert_close(matrix.cell("Friday", 23).unwrap(), 8.0);
    assert_close(matrix.cell("Sunday", 10).unwrap(), 1.0);
    assert!(matrix.cell("Tuesday", 11).is_none());
    assert_eq!(matrix.cells.len(), 7);
}

#[test]
fn heatmap_accumulates_per_slot() {
    let table = load_small();
    let matrix = weekday_hour_matrix(&table).unwrap();

    assert_close(matrix.cell("Monday", 13).unwrap(), 37.5);
    assert_close(matrix.cell("Monday", 9).unwrap(), 8.0);
    assert_close(matrix.cell("Tuesday", 13).unwrap(), 5.0);
    assert_close(matrix.cell("Sunday", 20).unwrap(), 14.5);
}

#[test]
fn rating_distribution_per_branch() {
    let table = load_small();
    let distribution = rating_distribution(&table).unwrap();

    assert_eq!(distribution.len(), 2);

    let branch_a = &distribution[0];
    assert_eq!(branch_a.branch, "A");
    assert_eq!(branch_a.count, 2);
    assert_close(branch_a.mean, 7.5);
    assert_close(branch_a.min, 7.0);
    assert_close(branch_a.q1, 7.25);
    assert_close(branch_a.median, 7.5);
    assert_close(branch_a.q3, 7.75);
    assert_close(branch_a.max, 8.0);

    // branch B's only rated row; the unrated row is excluded
    let branch_b = &distribution[1];
    assert_eq!(branch_b.branch, "B");
    assert_eq!(branch_b.count, 1);
    assert_close(branch_b.median, 6.5);
}

#[test]
fn store_serves_cached_table_until_invalidated() {
    let path = std::env::temp_dir().join(format!(
        "storelens-store-test-{}.csv",
        std::process::id()
    ));
    std::fs::write(
        &path,
        "branch,category,date,time,unit_price,quantity,rating,payment_method\n\
         A,Food,2019-01-07,13:05:00,$1.00,1,5.0,Cash\n",
    )
    .unwrap();

    let mut store = DatasetStore::new(&path);
    assert_eq!(store.table().unwrap().height(), 1);

    std::fs::write(
        &path,
        "branch,category,date,time,unit_price,quantity,rating,payment_method\n\
         A,Food,2019-01-07,13:05:00,$1.00,1,5.0,Cash\n\
         B,Home,2019-01-08,14:00:00,$2.00,2,6.0,Cash\n",
    )
    .unwrap();

    store.invalidate();
    assert_eq!(store.table().unwrap().height(), 2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn store_reloads_only_when_source_mtime_changes() {
    let path = std::env::temp_dir().join(format!(
        "storelens-mtime-test-{}.csv",
        std::process::id()
    ));
    std::fs::write(
        &path,
        "branch,category,date,time,unit_price,quantity,rating,payment_method\n\
         A,Food,2019-01-07,13:05:00,$1.00,1,5.0,Cash\n",
    )
    .unwrap();
    let original_mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

    let mut store = DatasetStore::new(&path);
    assert_eq!(store.table().unwrap().height(), 1);

    // rewrite the file but pin the old mtime: the cached table must be served
    std::fs::write(
        &path,
        "branch,category,date,time,unit_price,quantity,rating,payment_method\n\
         A,Food,2019-01-07,13:05:00,$1.00,1,5.0,Cash\n\
         B,Home,2019-01-08,14:00:00,$2.00,2,6.0,Cash\n",
    )
    .unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(original_mtime).unwrap();
    drop(file);
    assert_eq!(store.table().unwrap().height(), 1);

    // bump the mtime: the next access reloads without an explicit invalidate
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(original_mtime + std::time::Duration::from_secs(5))
        .unwrap();
    drop(file);
    assert_eq!(store.table().unwrap().height(), 2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn preview_returns_leading_rows_in_table_order() {
    let table = load_small();
    let rows = preview(&table, 2).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].branch, "A");
    assert_eq!(rows[0].category, "Food");
    assert_eq!(rows[0].date, date(2019, 1, 7));
    assert_eq!(rows[0].weekday, "Monday");
    assert_close(rows[0].total, 37.5);
    assert_eq!(rows[1].branch, "B");

    // limit past the end returns everything
    assert_eq!(preview(&table, 10).unwrap().len(), 4);
}

#[test]
fn store_reports_missing_source() {
    let mut store = DatasetStore::new(fixture("does_not_exist.csv"));
    assert!(store.report().unwrap().missing_source);
    assert_eq!(store.table().unwrap().height(), 0);
}
