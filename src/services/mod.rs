pub mod analysis;
pub mod charts;
pub mod filters;
pub mod loader;
pub mod sales;
pub mod summary;

pub use analysis::EdaEngine;
pub use filters::{apply_filters, FilterSpec};
pub use loader::{load, DatasetCache};
pub use summary::summarize;
