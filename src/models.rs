use serde::{Deserialize, Serialize};

use crate::services::sales::types::DateSpan;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: usize,
}

impl From<(String, usize)> for Frequency {
    fn from((value, count): (String, usize)) -> Self {
        Self { value, count }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub basic: BasicInfo,
    pub revenue: RevenueMetrics,
    pub customers: CustomerMetrics,
    pub products: ProductMetrics,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicInfo {
    pub row_count: usize,
    pub column_count: usize,
    pub date_span: Option<DateSpan>,
    pub memory_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueMetrics {
    pub total_revenue: f64,
    pub average_transaction: f64,
    pub max_transaction: f64,
    pub min_transaction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMetrics {
    pub total_customers: usize,
    pub member_percentage: f64,
    pub gender_distribution: Vec<Frequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMetrics {
    pub product_line_count: usize,
    pub top_product_line: String,
    pub total_quantity: f64,
}

/// Analysis selection coming from the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Univariate { column: String },
    Bivariate { column_a: String, column_b: String },
    Multivariate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisResult {
    Univariate(UnivariateResult),
    Bivariate(BivariateResult),
    Multivariate(MultivariateResult),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnivariateResult {
    Numeric {
        column: String,
        /// Money column; presentation formats these with a currency symbol.
        currency: bool,
        mean: Option<f64>,
        median: Option<f64>,
        std_dev: Option<f64>,
        skewness: Option<f64>,
    },
    Categorical {
        column: String,
        frequencies: Vec<Frequency>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn classify(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude > 0.7 {
            CorrelationStrength::Strong
        } else if magnitude > 0.3 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Defined {
        coefficient: f64,
        strength: CorrelationStrength,
    },
    /// Too few paired values or a column without variance.
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BivariateResult {
    Correlated {
        column_a: String,
        column_b: String,
        correlation: Correlation,
    },
    NotApplicable {
        column_a: String,
        column_b: String,
        reason: String,
    },
}

/// Outcome of one independently computed part of a larger result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Insight<T> {
    Ready(T),
    Failed(String),
}

impl<T> Insight<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Insight::Ready(value) => Some(value),
            Insight::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityProductRevenue {
    pub city: String,
    pub product_line: String,
    pub sum: f64,
    pub mean: f64,
}

/// Mean `Total` with cities as rows and customer types as columns. A cell is
/// `None` when a city has no rows of that customer type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingCrosstab {
    pub cities: Vec<String>,
    pub customer_types: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl SpendingCrosstab {
    pub fn get(&self, city: &str, customer_type: &str) -> Option<f64> {
        let row = self.cities.iter().position(|c| c == city)?;
        let column = self.customer_types.iter().position(|c| c == customer_type)?;
        self.values.get(row)?.get(column).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultivariateResult {
    pub revenue_by_city_product: Insight<Vec<CityProductRevenue>>,
    pub spending_by_city_customer: Insight<SpendingCrosstab>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductLinePerformance {
    pub product_line: String,
    pub revenue: f64,
    pub quantity: f64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: chrono::NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub revenue_by_city: Insight<Vec<CategoryTotal>>,
    pub product_line_performance: Insight<Vec<ProductLinePerformance>>,
    pub daily_revenue: Insight<Vec<DailyRevenue>>,
    pub customer_type_distribution: Insight<Vec<Frequency>>,
}
