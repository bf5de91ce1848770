use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::Serialize;

pub const DATE: &str = "Date";
pub const TIME: &str = "Time";
pub const TOTAL: &str = "Total";
pub const CITY: &str = "City";
pub const PRODUCT_LINE: &str = "Product line";
pub const CUSTOMER_TYPE: &str = "Customer_type";
pub const GENDER: &str = "Gender";
pub const UNIT_PRICE: &str = "Unit price";
pub const QUANTITY: &str = "Quantity";
pub const RATING: &str = "Rating";

pub const DATETIME: &str = "DateTime";
pub const MONTH: &str = "Month";
pub const MONTH_NUM: &str = "MonthNum";
pub const DAY_OF_WEEK: &str = "DayOfWeek";
pub const DAY_OF_WEEK_NUM: &str = "DayOfWeekNum";
pub const HOUR: &str = "Hour";
pub const TIME_OF_DAY: &str = "TimeOfDay";
pub const REVENUE_SEGMENT: &str = "Revenue_Segment";
pub const TRANSACTION_SIZE: &str = "Transaction_Size";
pub const AVG_CUSTOMER_SPENDING: &str = "Avg_Customer_Spending";

pub const MEMBER: &str = "Member";

pub const REQUIRED_COLUMNS: [&str; 9] = [
    DATE,
    TIME,
    TOTAL,
    CITY,
    PRODUCT_LINE,
    CUSTOMER_TYPE,
    GENDER,
    UNIT_PRICE,
    QUANTITY,
];

/// Columns holding money amounts; everything else numeric is a plain number.
pub const CURRENCY_COLUMNS: [&str; 5] = [TOTAL, UNIT_PRICE, "Tax 5%", "cogs", "gross income"];

pub fn is_currency_column(name: &str) -> bool {
    CURRENCY_COLUMNS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    TemporalParsing,
    FeatureDerivation,
    RevenueSegmentation,
    TransactionSize,
    CustomerEnrichment,
    ValidationSummary,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::TemporalParsing => "temporal parsing",
            Stage::FeatureDerivation => "feature derivation",
            Stage::RevenueSegmentation => "revenue segmentation",
            Stage::TransactionSize => "transaction size",
            Stage::CustomerEnrichment => "customer enrichment",
            Stage::ValidationSummary => "validation summary",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

/// Row-level temporal parse failures. Non-fatal: the affected cells are null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemporalParseWarning {
    pub invalid_dates: usize,
    pub invalid_times: usize,
    pub invalid_datetimes: usize,
}

impl TemporalParseWarning {
    pub fn is_clean(&self) -> bool {
        self.invalid_dates == 0 && self.invalid_times == 0 && self.invalid_datetimes == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub rows_before: usize,
    pub rows_after: usize,
    pub new_columns: usize,
    pub date_span: Option<DateSpan>,
    pub cities: Vec<String>,
    pub product_line_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub warnings: Vec<StageWarning>,
    pub temporal: TemporalParseWarning,
    pub unbucketed_rows: usize,
    pub summary: ValidationSummary,
}

impl PreprocessReport {
    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Preprocessing stage '{}' degraded: {}", stage, message);
        self.warnings.push(StageWarning { stage, message });
    }

    pub fn has_warnings_for(&self, stage: Stage) -> bool {
        self.warnings.iter().any(|w| w.stage == stage)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub frame: DataFrame,
    pub report: PreprocessReport,
}
