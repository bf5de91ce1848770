use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::sales::types::{CITY, DATE, PRODUCT_LINE};
use super::sales::utils::{date_span, date_values, distinct_in_order, str_values, typed_dates};
use crate::error::FilterError;

const ALL: &str = "All";
// 1970-01-01 counted from 0001-01-01, the origin of polars `Date` values.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Row predicates collected from the dashboard. `None` or `"All"` disables
/// the city / product line predicate; the date range is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub city: Option<String>,
    pub product_line: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn active(selection: &Option<String>) -> Option<&str> {
    selection
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ALL)
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        active(&self.city).is_none()
            && active(&self.product_line).is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}

pub fn apply_filters(df: &DataFrame, spec: &FilterSpec) -> Result<DataFrame, FilterError> {
    if let (Some(start), Some(end)) = (spec.start, spec.end) {
        if start > end {
            return Err(FilterError::InvalidDateRange { start, end });
        }
    }

    if spec.is_empty() {
        return Ok(df.clone());
    }

    let mut frame = df.clone();
    let mut predicates: Vec<Expr> = Vec::new();

    if let Some(city) = active(&spec.city) {
        predicates.push(value_equals(&frame, CITY, city)?);
    }
    if let Some(product_line) = active(&spec.product_line) {
        predicates.push(value_equals(&frame, PRODUCT_LINE, product_line)?);
    }
    if spec.start.is_some() || spec.end.is_some() {
        ensure_typed_dates(&mut frame)?;
        let day = col(DATE).cast(DataType::Int32);
        if let Some(start) = spec.start {
            predicates.push(day.clone().gt_eq(lit(epoch_days(start))));
        }
        if let Some(end) = spec.end {
            predicates.push(day.lt_eq(lit(epoch_days(end))));
        }
    }

    let filtered = match predicates.into_iter().reduce(|acc, p| acc.and(p)) {
        Some(predicate) => frame.lazy().filter(predicate).collect()?,
        None => frame,
    };
    tracing::debug!("Filters {:?} kept {} of {} rows", spec, filtered.height(), df.height());
    Ok(filtered)
}

fn value_equals(df: &DataFrame, column: &str, wanted: &str) -> Result<Expr, FilterError> {
    if df.column(column).is_err() {
        return Err(FilterError::MissingColumn(column.to_string()));
    }
    Ok(col(column).cast(DataType::String).eq(lit(wanted)))
}

/// Date predicates compare on the physical day number, so a `Date` column
/// that is still month/day/year text is parsed in place first.
fn ensure_typed_dates(df: &mut DataFrame) -> Result<(), FilterError> {
    let dates = typed_dates(df, DATE).map_err(|_| FilterError::MissingColumn(DATE.to_string()))?;
    df.with_column(dates)?;
    Ok(())
}

fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Values a presentation layer offers in its filter selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub product_lines: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl FilterOptions {
    pub fn from_frame(df: &DataFrame) -> Result<Self, FilterError> {
        let cities = distinct_in_order(&str_values(df, CITY).map_err(|_| FilterError::MissingColumn(CITY.to_string()))?);
        let product_lines = distinct_in_order(
            &str_values(df, PRODUCT_LINE).map_err(|_| FilterError::MissingColumn(PRODUCT_LINE.to_string()))?,
        );
        let span = date_span(&date_values(df, DATE).map_err(|_| FilterError::MissingColumn(DATE.to_string()))?);

        Ok(Self {
            cities,
            product_lines,
            min_date: span.map(|(lo, _)| lo),
            max_date: span.map(|(_, hi)| hi),
        })
    }
}
