use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::loader::date_from_days;
use crate::schema::{
    weekday_index, COL_BRANCH, COL_CATEGORY, COL_DATE, COL_HOUR, COL_PAYMENT_METHOD, COL_QUANTITY,
    COL_RATING, COL_TIME, COL_TOTAL, COL_UNIT_PRICE, COL_WEEKDAY, HOURS_PER_DAY, WEEKDAYS,
};

/// Headline metrics over a filtered view. The rating mean is computed over
/// non-null ratings only and is `None` when no row carries one.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    pub total_revenue: f64,
    pub average_rating: Option<f64>,
    pub transactions: usize,
}

pub fn summary(df: &DataFrame) -> Result<SummaryMetrics> {
    if df.height() == 0 {
        return Ok(SummaryMetrics {
            total_revenue: 0.0,
            average_rating: None,
            transactions: 0,
        });
    }

    let total = df.column(COL_TOTAL)?.f64()?;
    let rating = df.column(COL_RATING)?.f64()?;

    let mut revenue = 0.0;
    let mut rating_sum = 0.0;
    let mut rated_rows = 0usize;
    for idx in 0..df.height() {
        revenue += total.get(idx).unwrap_or(0.0);
        if let Some(value) = rating.get(idx) {
            rating_sum += value;
            rated_rows += 1;
        }
    }

    Ok(SummaryMetrics {
        total_revenue: revenue,
        average_rating: (rated_rows > 0).then(|| rating_sum / rated_rows as f64),
        transactions: df.height(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: f64,
}

pub fn revenue_by_category(df: &DataFrame) -> Result<Vec<CategoryRevenue>> {
    Ok(sum_by_label(df, COL_CATEGORY)?
        .into_iter()
        .map(|(category, revenue)| CategoryRevenue { category, revenue })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRevenue {
    pub payment_method: String,
    pub revenue: f64,
}

pub fn revenue_by_payment_method(df: &DataFrame) -> Result<Vec<PaymentRevenue>> {
    Ok(sum_by_label(df, COL_PAYMENT_METHOD)?
        .into_iter()
        .map(|(payment_method, revenue)| PaymentRevenue {
            payment_method,
            revenue,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: f64,
}

pub fn daily_revenue(df: &DataFrame) -> Result<Vec<DailyRevenue>> {
    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    if df.height() > 0 {
        let date = df.column(COL_DATE)?.date()?;
        let total = df.column(COL_TOTAL)?.f64()?;
        for idx in 0..df.height() {
            let (Some(days), Some(value)) = (date.get(idx), total.get(idx)) else {
                continue;
            };
            *totals.entry(days).or_insert(0.0) += value;
        }
    }

    Ok(totals
        .into_iter()
        .map(|(days, revenue)| DailyRevenue {
            date: date_from_days(days),
            revenue,
        })
        .collect())
}

/// Revenue pivoted into a weekday-by-hour matrix. Rows are always the full
/// Monday..Sunday set in that order; a `None` cell means no transactions
/// landed in that slot.
#[derive(Debug, Clone, Serialize)]
pub struct WeekdayHourMatrix {
    pub weekdays: [&'static str; 7],
    pub cells: Vec<[Option<f64>; HOURS_PER_DAY]>,
}

impl WeekdayHourMatrix {
    pub fn cell(&self, weekday: &str, hour: usize) -> Option<f64> {
        let row = weekday_index(weekday)?;
        self.cells.get(row)?.get(hour).copied().flatten()
    }
}

pub fn weekday_hour_matrix(df: &DataFrame) -> Result<WeekdayHourMatrix> {
    let mut cells = vec![[None; HOURS_PER_DAY]; WEEKDAYS.len()];

    if df.height() > 0 {
        let weekday = df.column(COL_WEEKDAY)?.str()?;
        let hour = df.column(COL_HOUR)?.i32()?;
        let total = df.column(COL_TOTAL)?.f64()?;
        for idx in 0..df.height() {
            let (Some(label), Some(hour_value), Some(value)) =
                (weekday.get(idx), hour.get(idx), total.get(idx))
            else {
                continue;
            };
            let Some(row) = weekday_index(label) else {
                continue;
            };
            let Ok(hour_idx) = usize::try_from(hour_value) else {
                continue;
            };
            if hour_idx >= HOURS_PER_DAY {
                continue;
            }
            let cell = &mut cells[row][hour_idx];
            *cell = Some(cell.unwrap_or(0.0) + value);
        }
    }

    Ok(WeekdayHourMatrix {
        weekdays: WEEKDAYS,
        cells,
    })
}

/// Five-number summary of ratings for one branch, feeding the violin/box
/// chart. Only rows with a rating participate.
#[derive(Debug, Clone, Serialize)]
pub struct BranchRatings {
    pub branch: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

pub fn rating_distribution(df: &DataFrame) -> Result<Vec<BranchRatings>> {
    let mut by_branch: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    if df.height() > 0 {
        let branch = df.column(COL_BRANCH)?.str()?;
        let rating = df.column(COL_RATING)?.f64()?;
        for idx in 0..df.height() {
            let (Some(label), Some(value)) = (branch.get(idx), rating.get(idx)) else {
                continue;
            };
            by_branch.entry(label.to_string()).or_default().push(value);
        }
    }

    Ok(by_branch
        .into_iter()
        .map(|(branch, mut ratings)| {
            ratings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let count = ratings.len();
            let mean = ratings.iter().sum::<f64>() / count as f64;
            BranchRatings {
                branch,
                count,
                mean,
                min: ratings[0],
                q1: quantile(&ratings, 0.25),
                median: quantile(&ratings, 0.5),
                q3: quantile(&ratings, 0.75),
                max: ratings[count - 1],
            }
        })
        .collect())
}

/// One cleaned row in owned form, for the data-preview surface.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRow {
    pub branch: String,
    pub category: String,
    pub date: NaiveDate,
    pub time: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub rating: Option<f64>,
    pub payment_method: String,
    pub hour: i32,
    pub weekday: String,
    pub total: f64,
}

/// First `limit` rows of a (filtered) cleaned table, in table order.
pub fn preview(df: &DataFrame, limit: usize) -> Result<Vec<TransactionRow>> {
    let count = df.height().min(limit);
    let mut rows = Vec::with_capacity(count);
    if count == 0 {
        return Ok(rows);
    }

    let branch = df.column(COL_BRANCH)?.str()?;
    let category = df.column(COL_CATEGORY)?.str()?;
    let date = df.column(COL_DATE)?.date()?;
    let time = df.column(COL_TIME)?.str()?;
    let unit_price = df.column(COL_UNIT_PRICE)?.f64()?;
    let quantity = df.column(COL_QUANTITY)?.f64()?;
    let rating = df.column(COL_RATING)?.f64()?;
    let payment_method = df.column(COL_PAYMENT_METHOD)?.str()?;
    let hour = df.column(COL_HOUR)?.i32()?;
    let weekday = df.column(COL_WEEKDAY)?.str()?;
    let total = df.column(COL_TOTAL)?.f64()?;

    for idx in 0..count {
        rows.push(TransactionRow {
            branch: branch.get(idx).unwrap_or_default().to_string(),
            category: category.get(idx).unwrap_or_default().to_string(),
            date: date_from_days(date.get(idx).unwrap_or_default()),
            time: time.get(idx).unwrap_or_default().to_string(),
            unit_price: unit_price.get(idx).unwrap_or_default(),
            quantity: quantity.get(idx).unwrap_or_default(),
            rating: rating.get(idx),
            payment_method: payment_method.get(idx).unwrap_or_default().to_string(),
            hour: hour.get(idx).unwrap_or_default(),
            weekday: weekday.get(idx).unwrap_or_default().to_string(),
            total: total.get(idx).unwrap_or_default(),
        });
    }
    Ok(rows)
}

fn sum_by_label(df: &DataFrame, column: &str) -> Result<BTreeMap<String, f64>> {
    let mut totals = BTreeMap::new();
    if df.height() == 0 {
        return Ok(totals);
    }

    let labels = df.column(column)?.str()?;
    let total = df.column(COL_TOTAL)?.f64()?;
    for idx in 0..df.height() {
        let (Some(label), Some(value)) = (labels.get(idx), total.get(idx)) else {
            continue;
        };
        *totals.entry(label.to_string()).or_insert(0.0) += value;
    }
    Ok(totals)
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
/// and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let last = sorted.len() - 1;
    let position = q * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (position - lower as f64) * (sorted[upper] - sorted[lower])
    }
}
