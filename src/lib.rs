pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use crate::error::AppError;
use crate::services::sales::{preprocess, PreparedTable, PreprocessOptions};
use crate::services::{apply_filters, DatasetCache, FilterSpec};
use polars::prelude::DataFrame;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub cache: DatasetCache,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        let cache = DatasetCache::new(config.cache_capacity);
        Self { config, cache }
    }

    /// Loads (through the cache) and prepares the configured dataset. The
    /// prepared frame is built fresh for every call.
    pub fn prepared(&self) -> Result<PreparedTable, AppError> {
        let raw = self.cache.get_or_load(&self.config.data_path)?;
        let options = PreprocessOptions {
            revenue_bins: self.config.revenue_bins.clone(),
        };
        Ok(preprocess(&raw, &options)?)
    }

    pub fn filtered(&self, filters: &FilterSpec) -> Result<DataFrame, AppError> {
        let prepared = self.prepared()?;
        Ok(apply_filters(&prepared.frame, filters)?)
    }
}
