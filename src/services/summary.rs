use polars::prelude::*;
use tracing::{debug, info};

use super::sales::types::{CUSTOMER_TYPE, DATE, DateSpan, GENDER, MEMBER, PRODUCT_LINE, QUANTITY, RATING, TOTAL};
use super::sales::utils::{date_span, date_values, str_values, value_counts};
use crate::error::SummaryError;
use crate::models::{BasicInfo, CustomerMetrics, DatasetSummary, Frequency, ProductMetrics, RevenueMetrics};

fn numeric(df: &DataFrame, name: &str) -> Result<Float64Chunked, SummaryError> {
    let series = df
        .column(name)
        .map_err(|_| SummaryError::Aggregation(format!("column '{}' is missing", name)))?
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

/// Dataset/KPI aggregates for the (possibly filtered) table.
pub fn summarize(df: &DataFrame) -> Result<DatasetSummary, SummaryError> {
    if df.height() == 0 {
        return Err(SummaryError::EmptyInput);
    }
    debug!("Summarizing {} rows", df.height());

    let summary = DatasetSummary {
        basic: basic_info(df)?,
        revenue: revenue_metrics(df)?,
        customers: customer_metrics(df)?,
        products: product_metrics(df)?,
        average_rating: match df.column(RATING) {
            Ok(_) => numeric(df, RATING)?.mean(),
            Err(_) => None,
        },
    };

    info!(
        "Summary: {} rows, revenue {:.2}, top product line '{}'",
        summary.basic.row_count, summary.revenue.total_revenue, summary.products.top_product_line
    );
    Ok(summary)
}

fn basic_info(df: &DataFrame) -> Result<BasicInfo, SummaryError> {
    let date_span = match df.column(DATE) {
        Ok(_) => date_span(&date_values(df, DATE)?).map(|(start, end)| DateSpan { start, end }),
        Err(_) => None,
    };

    Ok(BasicInfo {
        row_count: df.height(),
        column_count: df.width(),
        date_span,
        memory_bytes: df.estimated_size(),
    })
}

fn revenue_metrics(df: &DataFrame) -> Result<RevenueMetrics, SummaryError> {
    let totals = numeric(df, TOTAL)?;
    let no_values = || SummaryError::Aggregation(format!("column '{}' has no values", TOTAL));

    Ok(RevenueMetrics {
        total_revenue: totals.sum().unwrap_or(0.0),
        average_transaction: totals.mean().ok_or_else(no_values)?,
        max_transaction: totals.max().ok_or_else(no_values)?,
        min_transaction: totals.min().ok_or_else(no_values)?,
    })
}

fn customer_metrics(df: &DataFrame) -> Result<CustomerMetrics, SummaryError> {
    let missing = |name: &str| SummaryError::Aggregation(format!("column '{}' is missing", name));

    let types = str_values(df, CUSTOMER_TYPE).map_err(|_| missing(CUSTOMER_TYPE))?;
    let total_customers = types.iter().flatten().count();
    let members = types.iter().flatten().filter(|t| t.as_str() == MEMBER).count();
    let member_percentage = if total_customers == 0 {
        0.0
    } else {
        members as f64 / total_customers as f64 * 100.0
    };

    let gender_distribution = value_counts(df, GENDER)
        .map_err(|_| missing(GENDER))?
        .into_iter()
        .map(Frequency::from)
        .collect();

    Ok(CustomerMetrics {
        total_customers,
        member_percentage,
        gender_distribution,
    })
}

fn product_metrics(df: &DataFrame) -> Result<ProductMetrics, SummaryError> {
    let counts = value_counts(df, PRODUCT_LINE)
        .map_err(|_| SummaryError::Aggregation(format!("column '{}' is missing", PRODUCT_LINE)))?;
    let top_product_line = counts
        .first()
        .map(|(value, _)| value.clone())
        .ok_or_else(|| SummaryError::Aggregation(format!("column '{}' has no values to rank", PRODUCT_LINE)))?;

    Ok(ProductMetrics {
        product_line_count: counts.len(),
        top_product_line,
        total_quantity: numeric(df, QUANTITY)?.sum().unwrap_or(0.0),
    })
}
