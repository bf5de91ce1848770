use chrono::{Datelike, Month, NaiveDate, NaiveTime, Weekday};
use polars::prelude::*;

const DATE_FORMAT: &str = "%m/%d/%Y";
// Column polars names the frequency column in `value_counts` output.
const COUNT: &str = "count";
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

pub const MORNING: &str = "Morning";
pub const AFTERNOON: &str = "Afternoon";
pub const EVENING: &str = "Evening";

/// Parses a month/day/year date such as `1/5/2019`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Parses an hour:minute clock time, tolerating a trailing seconds field.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}

/// `[0,12)` Morning, `[12,17)` Afternoon, `[17,24]` Evening.
pub fn time_of_day(hour: u32) -> Option<&'static str> {
    match hour {
        0..=11 => Some(MORNING),
        12..=16 => Some(AFTERNOON),
        17..=24 => Some(EVENING),
        _ => None,
    }
}

pub fn month_name(date: NaiveDate) -> &'static str {
    u8::try_from(date.month())
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("")
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Monday = 0 through Sunday = 6.
pub fn weekday_number(day: Weekday) -> u32 {
    day.num_days_from_monday()
}

/// Returns the subset of `required` not present in `df`, in `required` order.
pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect()
}

pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

pub fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Reads a date column that is either already typed as `Date` or still raw
/// month/day/year text.
pub fn date_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let series = df.column(name)?;
    match series.dtype() {
        DataType::Date => Ok(series.date()?.as_date_iter().collect()),
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_date))
            .collect()),
        other => Err(PolarsError::ComputeError(
            format!("column '{}' has type {} and cannot be read as dates", name, other).into(),
        )),
    }
}

/// `name` as a `Date` typed series, parsing month/day/year text if needed.
pub fn typed_dates(df: &DataFrame, name: &str) -> PolarsResult<Series> {
    let series = df.column(name)?;
    if series.dtype() == &DataType::Date {
        return Ok(series.clone());
    }
    let dates = date_values(df, name)?;
    Ok(Series::new(name, dates.as_slice()))
}

pub fn date_span(dates: &[Option<NaiveDate>]) -> Option<(NaiveDate, NaiveDate)> {
    let mut present = dates.iter().flatten().copied();
    let first = present.next()?;
    Some(present.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

pub fn is_numeric_column(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|s| s.dtype().is_numeric())
        .unwrap_or(false)
}

/// Distinct non-null values in first-seen order.
pub fn distinct_in_order(values: &[Option<String>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .flatten()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

/// Non-null value frequencies of `name`, most frequent first; ties are
/// ordered by value so the result is stable.
pub fn value_counts(df: &DataFrame, name: &str) -> PolarsResult<Vec<(String, usize)>> {
    let series = df.column(name)?.cast(&DataType::String)?.drop_nulls();
    let counts = series
        .value_counts(false, false)?
        .sort([COUNT, name], vec![true, false], false)?;

    let values = counts.column(name)?.str()?;
    let totals = counts.column(COUNT)?.cast(&DataType::UInt64)?;
    let totals = totals.u64()?;

    Ok(values
        .into_iter()
        .zip(totals.into_iter())
        .filter_map(|(value, count)| Some((value?.to_string(), count? as usize)))
        .collect())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
