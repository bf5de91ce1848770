use axum::{
    extract::{Query, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppError,
    models::{AnalysisRequest, AnalysisResult, ChartData, DatasetSummary},
    services::{
        analysis::numeric_columns,
        charts::chart_data,
        filters::FilterOptions,
        sales::PreprocessReport,
        summarize, EdaEngine, FilterSpec,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/dataset", get(dataset_overview))
        .route("/summary", get(summary))
        .route("/charts", get(charts))
        .route("/analysis", post(analysis))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
pub struct DatasetOverview {
    report: PreprocessReport,
    filters: FilterOptions,
    numeric_columns: Vec<String>,
}

pub async fn dataset_overview(State(state): State<Arc<AppState>>) -> Result<Json<DatasetOverview>, AppError> {
    let prepared = state.prepared()?;
    let filters = FilterOptions::from_frame(&prepared.frame)?;

    Ok(Json(DatasetOverview {
        numeric_columns: numeric_columns(&prepared.frame),
        filters,
        report: prepared.report,
    }))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<FilterSpec>,
) -> Result<Json<DatasetSummary>, AppError> {
    let start = std::time::Instant::now();
    let df = state.filtered(&filters)?;
    let summary = summarize(&df)?;
    tracing::info!("Summary for {:?} computed in {:?}", filters, start.elapsed());
    Ok(Json(summary))
}

pub async fn charts(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<FilterSpec>,
) -> Result<Json<ChartData>, AppError> {
    let df = state.filtered(&filters)?;
    Ok(Json(chart_data(&df)))
}

#[axum::debug_handler]
pub async fn analysis(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<FilterSpec>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let start = std::time::Instant::now();
    let df = state.filtered(&filters)?;
    let result = EdaEngine::new(&df).run(&request)?;
    tracing::info!("Analysis {:?} completed in {:?}", request, start.elapsed());
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{BivariateResult, Correlation, UnivariateResult};
    use axum::http::StatusCode;

    fn state_for(path: &str) -> Arc<AppState> {
        let path = path.to_string();
        let config = Config::from_lookup(move |key| (key == "SALES_DATA_PATH").then(|| path.clone())).unwrap();
        Arc::new(AppState::new(config))
    }

    fn sample_state() -> Arc<AppState> {
        state_for(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/supermarket_sample.csv"))
    }

    #[tokio::test]
    async fn overview_lists_filters_and_numeric_columns() {
        let Json(overview) = dataset_overview(State(sample_state())).await.unwrap();
        assert_eq!(overview.report.summary.rows_after, 20);
        assert_eq!(overview.filters.cities, vec!["Yangon", "Naypyitaw", "Mandalay"]);
        assert!(overview.numeric_columns.contains(&"Total".to_string()));
        assert!(!overview.numeric_columns.contains(&"City".to_string()));
    }

    #[tokio::test]
    async fn summary_respects_city_filter() {
        let filters = FilterSpec {
            city: Some("Naypyitaw".to_string()),
            ..Default::default()
        };
        let Json(summary) = summary(State(sample_state()), Query(filters)).await.unwrap();
        assert_eq!(summary.basic.row_count, 3);
        assert!((summary.revenue.total_revenue - (80.22 + 627.6165 + 772.38)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn filter_without_rows_is_an_empty_input_error() {
        let filters = FilterSpec {
            city: Some("Atlantis".to_string()),
            ..Default::default()
        };
        let err = summary(State(sample_state()), Query(filters)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analysis_dispatches_requests() {
        let state = sample_state();

        let Json(result) = analysis(
            State(state.clone()),
            Query(FilterSpec::default()),
            Json(AnalysisRequest::Univariate { column: "Rating".to_string() }),
        )
        .await
        .unwrap();
        assert!(matches!(
            result,
            AnalysisResult::Univariate(UnivariateResult::Numeric { currency: false, .. })
        ));

        let Json(result) = analysis(
            State(state.clone()),
            Query(FilterSpec::default()),
            Json(AnalysisRequest::Bivariate {
                column_a: "Unit price".to_string(),
                column_b: "Total".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(matches!(
            result,
            AnalysisResult::Bivariate(BivariateResult::Correlated {
                correlation: Correlation::Defined { .. },
                ..
            })
        ));

        let err = analysis(
            State(state),
            Query(FilterSpec::default()),
            Json(AnalysisRequest::Univariate { column: "Nope".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_data_file_is_unavailable() {
        let err = charts(State(state_for("no/such/file.csv")), Query(FilterSpec::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
