use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::*;
use tracing::{debug, error, info};

use super::segments::SegmentBins;
use super::types::*;
use super::utils::{
    date_span, date_values, distinct_in_order, f64_values, missing_columns, month_name,
    parse_time, str_values, time_of_day, weekday_name, weekday_number,
};
use crate::error::PreprocessError;

#[derive(Debug, Clone, Default)]
pub struct PreprocessOptions {
    pub revenue_bins: SegmentBins,
}

struct ParsedTemporal {
    dates: Vec<Option<NaiveDate>>,
    times: Vec<Option<NaiveTime>>,
    datetimes: Vec<Option<NaiveDateTime>>,
}

fn stage_error(stage: Stage) -> impl Fn(PolarsError) -> PreprocessError {
    move |e| PreprocessError::Stage {
        stage,
        message: e.to_string(),
    }
}

/// Runs the preparation pipeline over a copy of `raw`.
///
/// Only missing required columns abort; every later stage that fails is
/// recorded as a warning on the report and the remaining stages still run.
pub fn preprocess(raw: &DataFrame, options: &PreprocessOptions) -> Result<PreparedTable, PreprocessError> {
    let start = Instant::now();
    info!("Preprocessing {} rows x {} columns", raw.height(), raw.width());

    let missing = missing_columns(raw, &REQUIRED_COLUMNS);
    if !missing.is_empty() {
        error!("Missing required columns: {:?}", missing);
        return Err(PreprocessError::MissingColumns(missing));
    }

    let mut frame = raw.clone();
    let mut report = PreprocessReport::default();

    let temporal = match parse_temporal(&frame, &mut report.temporal) {
        Ok(parsed) => {
            if !report.temporal.is_clean() {
                let t = &report.temporal;
                report.warn(
                    Stage::TemporalParsing,
                    format!(
                        "{} dates, {} times and {} date-times could not be parsed and were set to null",
                        t.invalid_dates, t.invalid_times, t.invalid_datetimes
                    ),
                );
            }
            Some(parsed)
        }
        Err(e) => {
            record(&mut report, e);
            None
        }
    };

    match &temporal {
        Some(parsed) => {
            if let Err(e) = attach_temporal(&mut frame, parsed) {
                record(&mut report, e);
            }
            if let Err(e) = derive_calendar_features(&mut frame, parsed) {
                record(&mut report, e);
            }
        }
        None => report.warn(Stage::FeatureDerivation, "skipped because temporal parsing failed"),
    }

    match segment_revenue(&frame, &options.revenue_bins) {
        Ok((series, unbucketed)) => {
            report.unbucketed_rows = unbucketed;
            if unbucketed > 0 {
                report.warn(
                    Stage::RevenueSegmentation,
                    format!("{} rows have a Total outside every revenue segment", unbucketed),
                );
            }
            if let Err(e) = frame.with_column(series) {
                record(&mut report, stage_error(Stage::RevenueSegmentation)(e));
            }
        }
        Err(e) => record(&mut report, e),
    }

    if let Err(e) = add_transaction_size(&mut frame) {
        record(&mut report, e);
    }

    // Group means come from the unfiltered input so every later filtered view
    // still sees the dataset-wide average for its customer type.
    if let Err(e) = add_customer_spending(&mut frame, raw) {
        record(&mut report, e);
    }

    match build_validation_summary(raw, &frame, temporal.as_ref()) {
        Ok(summary) => {
            if summary.rows_before != summary.rows_after {
                report.warn(
                    Stage::ValidationSummary,
                    format!("row count changed from {} to {}", summary.rows_before, summary.rows_after),
                );
            }
            report.summary = summary;
        }
        Err(e) => record(&mut report, e),
    }

    info!(
        "Preprocessing finished in {:?}: {} rows, {} new columns, {} warnings",
        start.elapsed(),
        frame.height(),
        report.summary.new_columns,
        report.warnings.len()
    );

    Ok(PreparedTable { frame, report })
}

fn record(report: &mut PreprocessReport, err: PreprocessError) {
    match err {
        PreprocessError::Stage { stage, message } => report.warn(stage, message),
        PreprocessError::MissingColumns(columns) => {
            report.warn(Stage::Validation, format!("missing columns: {}", columns.join(", ")))
        }
    }
}

fn parse_temporal(frame: &DataFrame, warning: &mut TemporalParseWarning) -> Result<ParsedTemporal, PreprocessError> {
    let to_err = stage_error(Stage::TemporalParsing);

    let dates = date_values(frame, DATE).map_err(&to_err)?;
    let times: Vec<Option<NaiveTime>> = str_values(frame, TIME)
        .map_err(&to_err)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_time))
        .collect();

    let datetimes: Vec<Option<NaiveDateTime>> = dates
        .iter()
        .zip(times.iter())
        .map(|(date, time)| match (date, time) {
            (Some(d), Some(t)) => Some(d.and_time(*t)),
            _ => None,
        })
        .collect();

    warning.invalid_dates = dates.iter().filter(|d| d.is_none()).count();
    warning.invalid_times = times.iter().filter(|t| t.is_none()).count();
    warning.invalid_datetimes = datetimes.iter().filter(|d| d.is_none()).count();
    debug!("Temporal parse failures: {:?}", warning);

    Ok(ParsedTemporal {
        dates,
        times,
        datetimes,
    })
}

fn attach_temporal(frame: &mut DataFrame, parsed: &ParsedTemporal) -> Result<(), PreprocessError> {
    let to_err = stage_error(Stage::TemporalParsing);
    frame
        .with_column(Series::new(DATE, parsed.dates.as_slice()))
        .map_err(&to_err)?;
    frame
        .with_column(Series::new(DATETIME, parsed.datetimes.as_slice()))
        .map_err(&to_err)?;
    Ok(())
}

fn derive_calendar_features(frame: &mut DataFrame, parsed: &ParsedTemporal) -> Result<(), PreprocessError> {
    let to_err = stage_error(Stage::FeatureDerivation);

    let month: Vec<Option<&str>> = parsed.dates.iter().map(|d| d.map(month_name)).collect();
    let month_num: Vec<Option<u32>> = parsed.dates.iter().map(|d| d.map(|d| d.month())).collect();
    let weekday: Vec<Option<&str>> = parsed
        .dates
        .iter()
        .map(|d| d.map(|d| weekday_name(d.weekday())))
        .collect();
    let weekday_num: Vec<Option<u32>> = parsed
        .dates
        .iter()
        .map(|d| d.map(|d| weekday_number(d.weekday())))
        .collect();
    let hour: Vec<Option<u32>> = parsed.times.iter().map(|t| t.map(|t| t.hour())).collect();
    let bucket: Vec<Option<&str>> = hour.iter().map(|h| h.and_then(time_of_day)).collect();

    for series in [
        Series::new(MONTH, month),
        Series::new(MONTH_NUM, month_num),
        Series::new(DAY_OF_WEEK, weekday),
        Series::new(DAY_OF_WEEK_NUM, weekday_num),
        Series::new(HOUR, hour),
        Series::new(TIME_OF_DAY, bucket),
    ] {
        frame.with_column(series).map_err(&to_err)?;
    }
    Ok(())
}

/// Returns the segment column and the number of rows left without a segment.
fn segment_revenue(frame: &DataFrame, bins: &SegmentBins) -> Result<(Series, usize), PreprocessError> {
    bins.validate().map_err(|e| PreprocessError::Stage {
        stage: Stage::RevenueSegmentation,
        message: e.to_string(),
    })?;

    let totals = f64_values(frame, TOTAL).map_err(stage_error(Stage::RevenueSegmentation))?;
    let segments: Vec<Option<&str>> = totals
        .iter()
        .map(|total| total.and_then(|t| bins.assign(t)))
        .collect();
    let unbucketed = segments.iter().filter(|s| s.is_none()).count();

    Ok((Series::new(REVENUE_SEGMENT, segments), unbucketed))
}

fn add_transaction_size(frame: &mut DataFrame) -> Result<(), PreprocessError> {
    let to_err = stage_error(Stage::TransactionSize);
    let prices = f64_values(frame, UNIT_PRICE).map_err(&to_err)?;
    let quantities = f64_values(frame, QUANTITY).map_err(&to_err)?;

    let sizes: Vec<Option<f64>> = prices
        .iter()
        .zip(quantities.iter())
        .map(|(price, qty)| match (price, qty) {
            (Some(p), Some(q)) => Some(p * q),
            _ => None,
        })
        .collect();

    frame
        .with_column(Series::new(TRANSACTION_SIZE, sizes))
        .map_err(&to_err)?;
    Ok(())
}

/// Mean `Total` per customer type over `source`, broadcast onto `frame`.
/// Rows without a customer type get no value.
fn add_customer_spending(frame: &mut DataFrame, source: &DataFrame) -> Result<(), PreprocessError> {
    let to_err = stage_error(Stage::CustomerEnrichment);

    let spending = source
        .clone()
        .lazy()
        .select([when(col(CUSTOMER_TYPE).is_null())
            .then(lit(NULL).cast(DataType::Float64))
            .otherwise(
                col(TOTAL)
                    .cast(DataType::Float64)
                    .mean()
                    .over([col(CUSTOMER_TYPE)]),
            )
            .alias(AVG_CUSTOMER_SPENDING)])
        .collect()
        .map_err(&to_err)?;
    let spending = spending.column(AVG_CUSTOMER_SPENDING).map_err(&to_err)?.clone();
    debug!("Customer spending attached to {} rows", spending.len());

    frame.with_column(spending).map_err(&to_err)?;
    Ok(())
}

fn build_validation_summary(
    raw: &DataFrame,
    frame: &DataFrame,
    temporal: Option<&ParsedTemporal>,
) -> Result<ValidationSummary, PreprocessError> {
    let to_err = stage_error(Stage::ValidationSummary);

    let cities = distinct_in_order(&str_values(frame, CITY).map_err(&to_err)?);
    let product_line_count = distinct_in_order(&str_values(frame, PRODUCT_LINE).map_err(&to_err)?).len();
    let date_span = temporal
        .and_then(|t| date_span(&t.dates))
        .map(|(start, end)| DateSpan { start, end });

    Ok(ValidationSummary {
        rows_before: raw.height(),
        rows_after: frame.height(),
        new_columns: frame.width().saturating_sub(raw.width()),
        date_span,
        cities,
        product_line_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sales::utils::{AFTERNOON, EVENING, MORNING};

    fn sample() -> DataFrame {
        df!(
            "Invoice ID" => &["750-67-8428", "226-31-3081", "631-41-3108", "123-19-1176", "373-73-7910"],
            "City" => &["Yangon", "Naypyitaw", "Yangon", "Yangon", "Mandalay"],
            "Customer_type" => &["Member", "Normal", "Normal", "Member", "Normal"],
            "Gender" => &["Female", "Female", "Male", "Male", "Male"],
            "Product line" => &["Health and beauty", "Electronic accessories", "Home and lifestyle", "Health and beauty", "Sports and travel"],
            "Unit price" => &[74.69, 15.28, 46.33, 58.22, 86.31],
            "Quantity" => &[7i64, 5, 7, 8, 7],
            "Total" => &[548.9715, 80.22, 340.5255, 489.048, 634.3785],
            "Date" => &["1/5/2019", "3/8/2019", "3/3/2019", "1/27/2019", "2/8/2019"],
            "Time" => &["13:08", "10:29", "13:23", "20:33", "10:37"],
            "Rating" => &[9.1, 9.6, 7.4, 8.4, 5.3]
        )
        .unwrap()
    }

    fn prepared() -> PreparedTable {
        preprocess(&sample(), &PreprocessOptions::default()).unwrap()
    }

    #[test]
    fn preserves_row_count_and_leaves_input_untouched() {
        let raw = sample();
        let table = preprocess(&raw, &PreprocessOptions::default()).unwrap();

        assert_eq!(table.frame.height(), raw.height());
        assert_eq!(table.report.summary.rows_before, 5);
        assert_eq!(table.report.summary.rows_after, 5);
        assert_eq!(raw.column(DATE).unwrap().dtype(), &DataType::String);
        assert!(raw.column(REVENUE_SEGMENT).is_err());
        assert!(table.report.warnings.is_empty(), "{:?}", table.report.warnings);
    }

    #[test]
    fn reports_every_missing_required_column() {
        let raw = sample().drop("Customer_type").unwrap().drop("Gender").unwrap();
        match preprocess(&raw, &PreprocessOptions::default()) {
            Err(PreprocessError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Customer_type".to_string(), "Gender".to_string()]);
            }
            other => panic!("expected MissingColumns, got {:?}", other.map(|t| t.report)),
        }
    }

    #[test]
    fn derives_calendar_features() {
        let frame = prepared().frame;

        assert_eq!(frame.column(DATE).unwrap().dtype(), &DataType::Date);
        let months = str_values(&frame, MONTH).unwrap();
        assert_eq!(months[0].as_deref(), Some("January"));
        assert_eq!(months[1].as_deref(), Some("March"));

        let month_nums = f64_values(&frame, MONTH_NUM).unwrap();
        assert_eq!(month_nums[4], Some(2.0));

        let weekdays = str_values(&frame, DAY_OF_WEEK).unwrap();
        assert_eq!(weekdays[0].as_deref(), Some("Saturday"));
        let weekday_nums = f64_values(&frame, DAY_OF_WEEK_NUM).unwrap();
        assert_eq!(weekday_nums[0], Some(5.0));
        // 3 March 2019 was a Sunday
        assert_eq!(weekday_nums[2], Some(6.0));

        let hours = f64_values(&frame, HOUR).unwrap();
        assert_eq!(hours, vec![Some(13.0), Some(10.0), Some(13.0), Some(20.0), Some(10.0)]);

        let buckets = str_values(&frame, TIME_OF_DAY).unwrap();
        assert_eq!(buckets[0].as_deref(), Some(AFTERNOON));
        assert_eq!(buckets[1].as_deref(), Some(MORNING));
        assert_eq!(buckets[3].as_deref(), Some(EVENING));
    }

    #[test]
    fn assigns_revenue_segments_and_transaction_size() {
        let frame = prepared().frame;

        let segments = str_values(&frame, REVENUE_SEGMENT).unwrap();
        let segments: Vec<Option<&str>> = segments.iter().map(|s| s.as_deref()).collect();
        assert_eq!(
            segments,
            vec![Some("VeryLarge"), Some("Small"), Some("Large"), Some("Large"), Some("VeryLarge")]
        );

        let sizes = f64_values(&frame, TRANSACTION_SIZE).unwrap();
        assert!((sizes[0].unwrap() - 74.69 * 7.0).abs() < 1e-9);
        assert!((sizes[3].unwrap() - 58.22 * 8.0).abs() < 1e-9);
    }

    #[test]
    fn customer_spending_is_the_group_mean_for_every_row() {
        let frame = prepared().frame;
        let types = str_values(&frame, CUSTOMER_TYPE).unwrap();
        let spending = f64_values(&frame, AVG_CUSTOMER_SPENDING).unwrap();
        let totals = f64_values(&frame, TOTAL).unwrap();

        for kind in ["Member", "Normal"] {
            let group: Vec<f64> = types
                .iter()
                .zip(totals.iter())
                .filter(|(t, _)| t.as_deref() == Some(kind))
                .map(|(_, total)| total.unwrap())
                .collect();
            let expected = group.iter().sum::<f64>() / group.len() as f64;

            for (t, value) in types.iter().zip(spending.iter()) {
                if t.as_deref() == Some(kind) {
                    assert!((value.unwrap() - expected).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn rows_without_customer_type_get_no_spending() {
        let mut raw = sample();
        raw.with_column(Series::new(
            CUSTOMER_TYPE,
            &[Some("Member"), None, Some("Normal"), Some("Member"), Some("Normal")],
        ))
        .unwrap();

        let table = preprocess(&raw, &PreprocessOptions::default()).unwrap();
        let spending = f64_values(&table.frame, AVG_CUSTOMER_SPENDING).unwrap();
        assert_eq!(spending[1], None);
        assert!((spending[0].unwrap() - (548.9715 + 489.048) / 2.0).abs() < 1e-9);
        assert!((spending[2].unwrap() - (340.5255 + 634.3785) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn unparseable_temporal_values_become_null_and_are_counted() {
        let mut raw = sample();
        raw.with_column(Series::new(DATE, &["1/5/2019", "not a date", "3/3/2019", "1/27/2019", "2/8/2019"]))
            .unwrap();
        raw.with_column(Series::new(TIME, &["13:08", "10:29", "99:99", "20:33", "10:37"]))
            .unwrap();

        let table = preprocess(&raw, &PreprocessOptions::default()).unwrap();
        assert_eq!(table.frame.height(), 5);
        assert_eq!(table.report.temporal.invalid_dates, 1);
        assert_eq!(table.report.temporal.invalid_times, 1);
        assert_eq!(table.report.temporal.invalid_datetimes, 2);
        assert!(table.report.has_warnings_for(Stage::TemporalParsing));

        let months = str_values(&table.frame, MONTH).unwrap();
        assert_eq!(months[1], None);
        let buckets = str_values(&table.frame, TIME_OF_DAY).unwrap();
        assert_eq!(buckets[2], None);
    }

    #[test]
    fn non_positive_totals_are_reported_as_unbucketed() {
        let mut raw = sample();
        raw.with_column(Series::new(TOTAL, &[0.0, 100.0, 100.01, -5.0, 500.01])).unwrap();

        let table = preprocess(&raw, &PreprocessOptions::default()).unwrap();
        assert_eq!(table.report.unbucketed_rows, 2);
        assert!(table.report.has_warnings_for(Stage::RevenueSegmentation));

        let segments = str_values(&table.frame, REVENUE_SEGMENT).unwrap();
        let segments: Vec<Option<&str>> = segments.iter().map(|s| s.as_deref()).collect();
        assert_eq!(segments, vec![None, Some("Small"), Some("Medium"), None, Some("VeryLarge")]);
    }

    #[test]
    fn invalid_bins_degrade_to_a_warning() {
        let options = PreprocessOptions {
            revenue_bins: SegmentBins {
                edges: vec![0.0, 300.0, 100.0],
                labels: vec!["a".to_string(), "b".to_string()],
            },
        };
        let table = preprocess(&sample(), &options).unwrap();

        assert!(table.report.has_warnings_for(Stage::RevenueSegmentation));
        assert!(table.frame.column(REVENUE_SEGMENT).is_err());
        // later stages still ran
        assert!(table.frame.column(TRANSACTION_SIZE).is_ok());
        assert!(table.frame.column(AVG_CUSTOMER_SPENDING).is_ok());
    }

    #[test]
    fn validation_summary_describes_the_result() {
        let summary = prepared().report.summary;
        assert_eq!(summary.cities, vec!["Yangon", "Naypyitaw", "Mandalay"]);
        assert_eq!(summary.product_line_count, 4);
        assert_eq!(summary.new_columns, 10);
        let span = summary.date_span.unwrap();
        assert_eq!(span.start, NaiveDate::from_ymd_opt(2019, 1, 5).unwrap());
        assert_eq!(span.end, NaiveDate::from_ymd_opt(2019, 3, 8).unwrap());
    }
}
