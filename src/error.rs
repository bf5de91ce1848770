use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

use crate::services::sales::types::Stage;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("preprocessing failed at {stage}: {message}")]
    Stage { stage: Stage, message: String },
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("cannot summarize an empty table")]
    EmptyInput,
    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

impl From<polars::error::PolarsError> for SummaryError {
    fn from(err: polars::error::PolarsError) -> Self {
        SummaryError::Aggregation(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("column not found: {}", .0.join(", "))]
    ColumnNotFound(Vec<String>),
    #[error("missing columns for analysis: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("analysis failed: {0}")]
    Computation(String),
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalysisError::Computation(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    #[error("filter column missing: {0}")]
    MissingColumn(String),
    #[error("filter failed: {0}")]
    Frame(String),
}

impl From<polars::error::PolarsError> for FilterError {
    fn from(err: polars::error::PolarsError) -> Self {
        FilterError::Frame(err.to_string())
    }
}

#[derive(Debug)]
pub enum AppError {
    InvalidInput(String),
    Load(LoadError),
    Preprocess(PreprocessError),
    Summary(SummaryError),
    Analysis(AnalysisError),
    Filter(FilterError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Load(err) => write!(f, "Load error: {}", err),
            AppError::Preprocess(err) => write!(f, "Preprocessing error: {}", err),
            AppError::Summary(err) => write!(f, "Summary error: {}", err),
            AppError::Analysis(err) => write!(f, "Analysis error: {}", err),
            AppError::Filter(err) => write!(f, "Filter error: {}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::Load(err)
    }
}

impl From<PreprocessError> for AppError {
    fn from(err: PreprocessError) -> Self {
        AppError::Preprocess(err)
    }
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        AppError::Summary(err)
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::Analysis(err)
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::Filter(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Preprocess(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Summary(SummaryError::EmptyInput) => StatusCode::NOT_FOUND,
            AppError::Summary(SummaryError::Aggregation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Analysis(AnalysisError::Computation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Analysis(_) => StatusCode::BAD_REQUEST,
            AppError::Filter(FilterError::Frame(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Filter(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("{}", message);
        } else {
            tracing::warn!("{}", message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_names_every_column() {
        let err = PreprocessError::MissingColumns(vec!["Customer_type".into(), "Gender".into()]);
        assert_eq!(err.to_string(), "missing required columns: Customer_type, Gender");
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let not_found = AppError::from(AnalysisError::ColumnNotFound(vec!["Foo".into()]));
        assert_eq!(not_found.status(), StatusCode::BAD_REQUEST);

        let empty = AppError::from(SummaryError::EmptyInput);
        assert_eq!(empty.status(), StatusCode::NOT_FOUND);

        let missing_file = AppError::from(LoadError::FileNotFound(PathBuf::from("nope.csv")));
        assert_eq!(missing_file.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(missing_file.to_string().contains("nope.csv"));
    }
}
