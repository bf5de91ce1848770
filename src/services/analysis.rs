use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{debug, info, warn};

use super::sales::types::{is_currency_column, CITY, CUSTOMER_TYPE, PRODUCT_LINE, TOTAL};
use super::sales::utils::{f64_values, is_numeric_column, missing_columns, round2, str_values, value_counts};
use crate::error::AnalysisError;
use crate::models::{
    AnalysisRequest, AnalysisResult, BivariateResult, CityProductRevenue, Correlation, CorrelationStrength,
    Frequency, Insight, MultivariateResult, SpendingCrosstab, UnivariateResult,
};

pub const MULTIVARIATE_COLUMNS: [&str; 4] = [CITY, PRODUCT_LINE, TOTAL, CUSTOMER_TYPE];

const PAIR_X: &str = "x";
const PAIR_Y: &str = "y";

/// Columns that can be fed to numeric analysis.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .map(|s| s.name().to_string())
        .collect()
}

/// Exploratory analysis over one prepared (and possibly filtered) table.
pub struct EdaEngine<'a> {
    df: &'a DataFrame,
}

impl<'a> EdaEngine<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        Self { df }
    }

    pub fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        info!("Running {:?} over {} rows", request, self.df.height());
        match request {
            AnalysisRequest::Univariate { column } => self.univariate(column).map(AnalysisResult::Univariate),
            AnalysisRequest::Bivariate { column_a, column_b } => {
                self.bivariate(column_a, column_b).map(AnalysisResult::Bivariate)
            }
            AnalysisRequest::Multivariate => self.multivariate().map(AnalysisResult::Multivariate),
        }
    }

    pub fn univariate(&self, column: &str) -> Result<UnivariateResult, AnalysisError> {
        if self.df.column(column).is_err() {
            return Err(AnalysisError::ColumnNotFound(vec![column.to_string()]));
        }

        if !is_numeric_column(self.df, column) {
            let frequencies = value_counts(self.df, column)?
                .into_iter()
                .map(Frequency::from)
                .collect();
            return Ok(UnivariateResult::Categorical {
                column: column.to_string(),
                frequencies,
            });
        }

        let series = self.df.column(column)?.cast(&DataType::Float64)?;
        let ca = series.f64()?;
        let constant = is_constant(ca);

        Ok(UnivariateResult::Numeric {
            column: column.to_string(),
            currency: is_currency_column(column),
            mean: ca.mean(),
            median: ca.median(),
            std_dev: ca.std(1).map(|sd| if constant { 0.0 } else { sd }),
            skewness: skewness(&series)?,
        })
    }

    pub fn bivariate(&self, column_a: &str, column_b: &str) -> Result<BivariateResult, AnalysisError> {
        let missing = missing_columns(self.df, &[column_a, column_b]);
        if !missing.is_empty() {
            return Err(AnalysisError::ColumnNotFound(missing));
        }

        let non_numeric: Vec<&str> = [column_a, column_b]
            .into_iter()
            .filter(|c| !is_numeric_column(self.df, c))
            .collect();
        if !non_numeric.is_empty() {
            debug!("Correlation not applicable, non-numeric: {:?}", non_numeric);
            return Ok(BivariateResult::NotApplicable {
                column_a: column_a.to_string(),
                column_b: column_b.to_string(),
                reason: format!(
                    "correlation needs two numeric columns; '{}' is categorical",
                    non_numeric.join("', '")
                ),
            });
        }

        let pairs = self
            .df
            .clone()
            .lazy()
            .select([
                col(column_a).cast(DataType::Float64).alias(PAIR_X),
                col(column_b).cast(DataType::Float64).alias(PAIR_Y),
            ])
            .drop_nulls(None)
            .filter(col(PAIR_X).is_finite().and(col(PAIR_Y).is_finite()))
            .collect()?;
        debug!("Correlating {} complete pairs", pairs.height());

        let correlation = match pearson(pairs.column(PAIR_X)?.f64()?, pairs.column(PAIR_Y)?.f64()?) {
            Some(r) => Correlation::Defined {
                coefficient: r,
                strength: CorrelationStrength::classify(r),
            },
            None => Correlation::Undefined,
        };

        Ok(BivariateResult::Correlated {
            column_a: column_a.to_string(),
            column_b: column_b.to_string(),
            correlation,
        })
    }

    pub fn multivariate(&self) -> Result<MultivariateResult, AnalysisError> {
        let missing = missing_columns(self.df, &MULTIVARIATE_COLUMNS);
        if !missing.is_empty() {
            return Err(AnalysisError::MissingColumns(missing));
        }

        let revenue_by_city_product = match self.revenue_by_city_product() {
            Ok(rows) => Insight::Ready(rows),
            Err(e) => {
                warn!("Revenue by city and product line failed: {}", e);
                Insight::Failed(e.to_string())
            }
        };
        let spending_by_city_customer = match self.spending_by_city_customer() {
            Ok(table) => Insight::Ready(table),
            Err(e) => {
                warn!("Spending by city and customer type failed: {}", e);
                Insight::Failed(e.to_string())
            }
        };

        Ok(MultivariateResult {
            revenue_by_city_product,
            spending_by_city_customer,
        })
    }

    fn revenue_by_city_product(&self) -> Result<Vec<CityProductRevenue>, AnalysisError> {
        let grouped = self
            .df
            .clone()
            .lazy()
            .group_by([col(CITY).cast(DataType::String), col(PRODUCT_LINE).cast(DataType::String)])
            .agg([
                col(TOTAL).cast(DataType::Float64).sum().alias("sum"),
                col(TOTAL).cast(DataType::Float64).mean().alias("mean"),
            ])
            .collect()?;

        let cities = str_values(&grouped, CITY)?;
        let products = str_values(&grouped, PRODUCT_LINE)?;
        let sums = f64_values(&grouped, "sum")?;
        let means = f64_values(&grouped, "mean")?;

        let mut rows: Vec<CityProductRevenue> = cities
            .into_iter()
            .zip(products)
            .zip(sums.into_iter().zip(means))
            .filter_map(|((city, product), (sum, mean))| {
                Some(CityProductRevenue {
                    city: city?,
                    product_line: product?,
                    sum: round2(sum.unwrap_or(0.0)),
                    mean: round2(mean?),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.city.cmp(&b.city).then_with(|| a.product_line.cmp(&b.product_line)));
        Ok(rows)
    }

    fn spending_by_city_customer(&self) -> Result<SpendingCrosstab, AnalysisError> {
        let grouped = self
            .df
            .clone()
            .lazy()
            .group_by([col(CITY).cast(DataType::String), col(CUSTOMER_TYPE).cast(DataType::String)])
            .agg([col(TOTAL).cast(DataType::Float64).mean().alias("mean")])
            .collect()?;

        let cities = str_values(&grouped, CITY)?;
        let types = str_values(&grouped, CUSTOMER_TYPE)?;
        let means = f64_values(&grouped, "mean")?;

        let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
        for ((city, customer_type), mean) in cities.into_iter().zip(types).zip(means) {
            if let (Some(city), Some(customer_type), Some(mean)) = (city, customer_type, mean) {
                cells.insert((city, customer_type), round2(mean));
            }
        }

        let mut cities: Vec<String> = cells.keys().map(|(c, _)| c.clone()).collect();
        cities.dedup();
        let mut customer_types: Vec<String> = cells.keys().map(|(_, t)| t.clone()).collect();
        customer_types.sort();
        customer_types.dedup();

        let values = cities
            .iter()
            .map(|city| {
                customer_types
                    .iter()
                    .map(|t| cells.get(&(city.clone(), t.clone())).copied())
                    .collect()
            })
            .collect();

        Ok(SpendingCrosstab {
            cities,
            customer_types,
            values,
        })
    }
}

/// Pearson r over complete pairs. `None` when fewer than two pairs remain or
/// either side holds a single repeated value.
pub fn pearson(x: &Float64Chunked, y: &Float64Chunked) -> Option<f64> {
    if x.len() < 2 || x.len() != y.len() || is_constant(x) || is_constant(y) {
        return None;
    }
    polars::prelude::cov::pearson_corr(x, y, 1)
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(-1.0, 1.0))
}

/// Adjusted Fisher-Pearson sample skewness (the estimator pandas uses).
pub fn skewness(series: &Series) -> PolarsResult<Option<f64>> {
    let ca = series.f64()?;
    if ca.len() - ca.null_count() < 3 || is_constant(ca) {
        return Ok(None);
    }
    Ok(series.skew(false)?.filter(|g| g.is_finite()))
}

/// Whether the non-null values are one repeated value. Compared on the spread
/// rather than the variance, which rounding in the mean leaves slightly above
/// zero for constants such as 4.761904762.
fn is_constant(ca: &Float64Chunked) -> bool {
    match (ca.min(), ca.max()) {
        (Some(lo), Some(hi)) => hi - lo <= f64::EPSILON * lo.abs().max(hi.abs()),
        _ => true,
    }
}
