use anyhow::Result;
use axum::Router;
use std::sync::Arc;

use sales_insights::{config, logging, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::Config::new()?;
    tracing::info!("Serving sales data from {}", config.data_path.display());

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config));

    // Warm the cache so a bad path or file shows up at startup
    match state.prepared() {
        Ok(prepared) => tracing::info!(
            "Dataset ready: {} rows, {} warnings",
            prepared.frame.height(),
            prepared.report.warnings.len()
        ),
        Err(e) => tracing::warn!("Dataset not available yet: {}", e),
    }

    let app = Router::new()
        .merge(routes::routes())
        .merge(routes::dashboard::routes())
        .with_state(state);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
