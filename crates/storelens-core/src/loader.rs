use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use csv::{ReaderBuilder, StringRecord};
use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::{DatasetError, Result};
use crate::schema::{
    weekday_label, COL_BRANCH, COL_CATEGORY, COL_DATE, COL_HOUR, COL_PAYMENT_METHOD, COL_QUANTITY,
    COL_RATING, COL_TIME, COL_TOTAL, COL_UNIT_PRICE, COL_WEEKDAY,
};

static DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%d-%m-%Y"];
static TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Counts from one cleaning pass. Rows are dropped silently at the row level,
/// but the totals are kept so callers can surface data-quality loss.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub missing_source: bool,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped_datetime: usize,
    pub rows_dropped_numeric: usize,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped_datetime + self.rows_dropped_numeric
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub table: DataFrame,
    pub report: LoadReport,
}

struct ColumnIndices {
    branch: usize,
    category: usize,
    date: usize,
    time: usize,
    unit_price: usize,
    quantity: usize,
    rating: usize,
    payment_method: usize,
}

fn locate_columns(headers: &StringRecord) -> Result<ColumnIndices> {
    let normalized: Vec<String> = headers.iter().map(crate::schema::normalize_header).collect();
    let find = |name: &str| -> Result<usize> {
        normalized
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    };

    Ok(ColumnIndices {
        branch: find(COL_BRANCH)?,
        category: find(COL_CATEGORY)?,
        date: find(COL_DATE)?,
        time: find(COL_TIME)?,
        unit_price: find(COL_UNIT_PRICE)?,
        quantity: find(COL_QUANTITY)?,
        rating: find(COL_RATING)?,
        payment_method: find(COL_PAYMENT_METHOD)?,
    })
}

#[derive(Default)]
struct CleanedColumns {
    branch: Vec<String>,
    category: Vec<String>,
    date_days: Vec<i32>,
    time: Vec<String>,
    unit_price: Vec<f64>,
    quantity: Vec<f64>,
    rating: Vec<Option<f64>>,
    payment_method: Vec<String>,
    hour: Vec<i32>,
    weekday: Vec<&'static str>,
    total: Vec<f64>,
}

/// Loads and cleans the transactions CSV.
///
/// A missing source file is not an error: the outcome carries an empty table
/// and `report.missing_source` is set. Rows whose date or time fail to parse
/// are dropped first; survivors are then dropped if unit price (after
/// stripping a literal leading `$`) or quantity fail to parse as numeric.
/// `total` is always recomputed as `unit_price * quantity`, and a bad rating
/// value becomes null without dropping the row. Row order is preserved.
pub fn load_transactions(path: impl AsRef<Path>) -> Result<LoadOutcome> {
    let path = path.as_ref();
    let mut report = LoadReport {
        source: path.display().to_string(),
        missing_source: false,
        rows_read: 0,
        rows_kept: 0,
        rows_dropped_datetime: 0,
        rows_dropped_numeric: 0,
    };

    if !path.exists() {
        warn!(source = %path.display(), "transactions file not found; producing an empty table");
        report.missing_source = true;
        return Ok(LoadOutcome {
            table: build_table(CleanedColumns::default())?,
            report,
        });
    }

    let contents = std::fs::read_to_string(path)?;
    // flexible: ragged rows surface as missing/extra fields and are dropped
    // by the per-field parses like any other malformed row
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents.as_bytes());
    let headers = reader.headers()?.clone();
    let indices = locate_columns(&headers)?;

    let mut columns = CleanedColumns::default();

    for record in reader.records() {
        let record = record?;
        report.rows_read += 1;

        let date = parse_date(field(&record, indices.date));
        let time = parse_time(field(&record, indices.time));
        let (Some(date), Some(time)) = (date, time) else {
            report.rows_dropped_datetime += 1;
            continue;
        };

        let unit_price = parse_price(field(&record, indices.unit_price));
        let quantity = parse_numeric(field(&record, indices.quantity));
        let (Some(unit_price), Some(quantity)) = (unit_price, quantity) else {
            report.rows_dropped_numeric += 1;
            continue;
        };

        columns.branch.push(field(&record, indices.branch).trim().to_string());
        columns
            .category
            .push(field(&record, indices.category).trim().to_string());
        columns.date_days.push(days_since_epoch(date));
        columns.time.push(field(&record, indices.time).trim().to_string());
        columns.unit_price.push(unit_price);
        columns.quantity.push(quantity);
        columns
            .rating
            .push(parse_numeric(field(&record, indices.rating)));
        columns
            .payment_method
            .push(field(&record, indices.payment_method).trim().to_string());
        columns.hour.push(time.hour() as i32);
        columns.weekday.push(weekday_label(date.weekday()));
        columns.total.push(unit_price * quantity);
        report.rows_kept += 1;
    }

    if report.rows_dropped() > 0 {
        warn!(
            source = %path.display(),
            read = report.rows_read,
            dropped = report.rows_dropped(),
            "dropped rows that failed cleaning"
        );
    }

    let table = build_table(columns)?;
    Ok(LoadOutcome { table, report })
}

fn field<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or_default()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
}

fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn parse_price(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_prefix('$').unwrap_or(trimmed);
    parse_numeric(stripped)
}

pub(crate) fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE).unwrap_or(NaiveDate::MIN)
}

fn build_table(columns: CleanedColumns) -> Result<DataFrame> {
    let date_series = Series::new(COL_DATE.into(), columns.date_days).cast(&DataType::Date)?;

    let cols: Vec<Column> = vec![
        Series::new(COL_BRANCH.into(), columns.branch).into(),
        Series::new(COL_CATEGORY.into(), columns.category).into(),
        date_series.into(),
        Series::new(COL_TIME.into(), columns.time).into(),
        Series::new(COL_UNIT_PRICE.into(), columns.unit_price).into(),
        Series::new(COL_QUANTITY.into(), columns.quantity).into(),
        Series::new(COL_RATING.into(), columns.rating).into(),
        Series::new(COL_PAYMENT_METHOD.into(), columns.payment_method).into(),
        Series::new(COL_HOUR.into(), columns.hour).into(),
        Series::new(COL_WEEKDAY.into(), columns.weekday).into(),
        Series::new(COL_TOTAL.into(), columns.total).into(),
    ];

    Ok(DataFrame::new(cols)?)
}
