pub mod preprocess;
pub mod segments;
pub mod types;
pub mod utils;

pub use preprocess::{preprocess, PreprocessOptions};
pub use segments::SegmentBins;
pub use types::{PreparedTable, PreprocessReport};
