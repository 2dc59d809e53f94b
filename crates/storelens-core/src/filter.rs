use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::Result;
use crate::loader::{date_from_days, days_since_epoch};
use crate::schema::{COL_BRANCH, COL_CATEGORY, COL_DATE};

/// User-selected view of the cleaned table. `None` means unrestricted,
/// matching the dashboard default where every option is selected.
#[derive(Debug, Clone, Default)]
pub struct FilterSelection {
    pub branches: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FilterSelection {
    pub fn is_unrestricted(&self) -> bool {
        self.branches.is_none()
            && self.categories.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Derives a filtered view: branch and category membership plus an inclusive
/// date range. Produces a new frame; the source table is never mutated.
pub fn apply_filter(df: &DataFrame, selection: &FilterSelection) -> Result<DataFrame> {
    if df.height() == 0 || selection.is_unrestricted() {
        return Ok(df.clone());
    }

    let branch = df.column(COL_BRANCH)?.str()?;
    let category = df.column(COL_CATEGORY)?.str()?;
    let date = df.column(COL_DATE)?.date()?;

    let branch_set: Option<HashSet<&str>> = selection
        .branches
        .as_ref()
        .map(|values| values.iter().map(String::as_str).collect());
    let category_set: Option<HashSet<&str>> = selection
        .categories
        .as_ref()
        .map(|values| values.iter().map(String::as_str).collect());
    let start_days = selection.start_date.map(days_since_epoch);
    let end_days = selection.end_date.map(days_since_epoch);

    let mut keep = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let mut retain = true;

        if let Some(set) = &branch_set {
            retain &= branch.get(idx).is_some_and(|value| set.contains(value));
        }
        if let Some(set) = &category_set {
            retain &= category.get(idx).is_some_and(|value| set.contains(value));
        }
        if let Some(start) = start_days {
            retain &= date.get(idx).is_some_and(|days| days >= start);
        }
        if let Some(end) = end_days {
            retain &= date.get(idx).is_some_and(|days| days <= end);
        }

        keep.push(retain);
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Min/max dates of the cleaned table, bounding the UI date-range picker.
pub fn date_bounds(df: &DataFrame) -> Result<Option<(NaiveDate, NaiveDate)>> {
    if df.height() == 0 {
        return Ok(None);
    }

    let date = df.column(COL_DATE)?.date()?;
    let mut min_days: Option<i32> = None;
    let mut max_days: Option<i32> = None;
    for idx in 0..df.height() {
        if let Some(days) = date.get(idx) {
            min_days = Some(min_days.map_or(days, |current| current.min(days)));
            max_days = Some(max_days.map_or(days, |current| current.max(days)));
        }
    }

    Ok(min_days
        .zip(max_days)
        .map(|(lo, hi)| (date_from_days(lo), date_from_days(hi))))
}

/// Distinct branch labels, sorted, for the multi-select control.
pub fn distinct_branches(df: &DataFrame) -> Result<Vec<String>> {
    distinct_labels(df, COL_BRANCH)
}

/// Distinct category labels, sorted, for the multi-select control.
pub fn distinct_categories(df: &DataFrame) -> Result<Vec<String>> {
    distinct_labels(df, COL_CATEGORY)
}

fn distinct_labels(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let values = df.column(column)?.str()?;
    let mut seen = BTreeSet::new();
    for idx in 0..df.height() {
        if let Some(value) = values.get(idx) {
            seen.insert(value.to_string());
        }
    }
    Ok(seen.into_iter().collect())
}
