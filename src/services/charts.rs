use polars::prelude::*;
use tracing::warn;

use super::sales::types::{CITY, CUSTOMER_TYPE, DATE, PRODUCT_LINE, QUANTITY, RATING, TOTAL};
use super::sales::utils::{date_values, f64_values, missing_columns, str_values, typed_dates, value_counts};
use crate::error::AnalysisError;
use crate::models::{CategoryTotal, ChartData, DailyRevenue, Frequency, Insight, ProductLinePerformance};

fn settle<T>(name: &str, result: Result<T, AnalysisError>) -> Insight<T> {
    match result {
        Ok(value) => Insight::Ready(value),
        Err(e) => {
            warn!("Chart data '{}' unavailable: {}", name, e);
            Insight::Failed(e.to_string())
        }
    }
}

fn require(df: &DataFrame, columns: &[&str]) -> Result<(), AnalysisError> {
    let missing = missing_columns(df, columns);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::MissingColumns(missing))
    }
}

/// Aggregates behind the dashboard charts. Each series is computed on its
/// own; a failure in one leaves the others intact.
pub fn chart_data(df: &DataFrame) -> ChartData {
    ChartData {
        revenue_by_city: settle("revenue_by_city", revenue_by_city(df)),
        product_line_performance: settle("product_line_performance", product_line_performance(df)),
        daily_revenue: settle("daily_revenue", daily_revenue(df)),
        customer_type_distribution: settle("customer_type_distribution", customer_type_distribution(df)),
    }
}

pub fn revenue_by_city(df: &DataFrame) -> Result<Vec<CategoryTotal>, AnalysisError> {
    require(df, &[CITY, TOTAL])?;

    let grouped = df
        .clone()
        .lazy()
        .group_by([col(CITY).cast(DataType::String)])
        .agg([col(TOTAL).cast(DataType::Float64).sum().alias(TOTAL)])
        .collect()?;

    let mut rows: Vec<CategoryTotal> = str_values(&grouped, CITY)?
        .into_iter()
        .zip(f64_values(&grouped, TOTAL)?)
        .filter_map(|(city, total)| {
            Some(CategoryTotal {
                label: city?,
                value: total.unwrap_or(0.0),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(rows)
}

pub fn product_line_performance(df: &DataFrame) -> Result<Vec<ProductLinePerformance>, AnalysisError> {
    require(df, &[PRODUCT_LINE, TOTAL, QUANTITY])?;
    let has_rating = df.column(RATING).is_ok();

    let mut aggs = vec![
        col(TOTAL).cast(DataType::Float64).sum().alias(TOTAL),
        col(QUANTITY).cast(DataType::Float64).sum().alias(QUANTITY),
    ];
    if has_rating {
        aggs.push(col(RATING).cast(DataType::Float64).mean().alias(RATING));
    }

    let grouped = df
        .clone()
        .lazy()
        .group_by([col(PRODUCT_LINE).cast(DataType::String)])
        .agg(aggs)
        .collect()?;

    let products = str_values(&grouped, PRODUCT_LINE)?;
    let revenue = f64_values(&grouped, TOTAL)?;
    let quantity = f64_values(&grouped, QUANTITY)?;
    let rating = if has_rating {
        f64_values(&grouped, RATING)?
    } else {
        vec![None; grouped.height()]
    };

    let mut rows: Vec<ProductLinePerformance> = products
        .into_iter()
        .zip(revenue)
        .zip(quantity.into_iter().zip(rating))
        .filter_map(|((product, revenue), (quantity, rating))| {
            Some(ProductLinePerformance {
                product_line: product?,
                revenue: revenue.unwrap_or(0.0),
                quantity: quantity.unwrap_or(0.0),
                average_rating: rating,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.product_line.cmp(&b.product_line));
    Ok(rows)
}

pub fn daily_revenue(df: &DataFrame) -> Result<Vec<DailyRevenue>, AnalysisError> {
    require(df, &[DATE, TOTAL])?;

    let mut frame = df.select([TOTAL])?;
    frame.with_column(typed_dates(df, DATE)?)?;

    let grouped = frame
        .lazy()
        .filter(col(DATE).is_not_null())
        .group_by([col(DATE)])
        .agg([col(TOTAL).cast(DataType::Float64).sum().alias(TOTAL)])
        .sort(DATE, SortOptions::default())
        .collect()?;

    Ok(date_values(&grouped, DATE)?
        .into_iter()
        .zip(f64_values(&grouped, TOTAL)?)
        .filter_map(|(date, revenue)| {
            Some(DailyRevenue {
                date: date?,
                revenue: revenue.unwrap_or(0.0),
            })
        })
        .collect())
}

pub fn customer_type_distribution(df: &DataFrame) -> Result<Vec<Frequency>, AnalysisError> {
    require(df, &[CUSTOMER_TYPE])?;
    Ok(value_counts(df, CUSTOMER_TYPE)?
        .into_iter()
        .map(Frequency::from)
        .collect())
}
