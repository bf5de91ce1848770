use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use moka::sync::Cache;
use polars::prelude::*;
use tracing::{debug, error, info};

use crate::error::LoadError;

const INFER_SCHEMA_ROWS: usize = 10_000;

/// Reads the CSV at `path` into a frame, letting polars infer the schema.
pub fn load(path: &Path) -> Result<DataFrame, LoadError> {
    let start = Instant::now();
    info!("Loading sales data from {}", path.display());

    if !path.exists() {
        error!("Data file not found: {}", path.display());
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }

    let parse_err = |e: PolarsError| {
        error!("Failed to parse {}: {}", path.display(), e);
        LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    };

    let df = CsvReader::from_path(path)
        .map_err(parse_err)?
        .has_header(true)
        .infer_schema(Some(INFER_SCHEMA_ROWS))
        .finish()
        .map_err(parse_err)?;

    info!(
        "Loaded {} rows x {} columns in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    );
    Ok(df)
}

#[derive(Clone)]
struct CachedFrame {
    modified: SystemTime,
    frame: DataFrame,
}

/// Loaded frames keyed by path. An entry is only served while the file's
/// modification time matches the one it was loaded with; otherwise the whole
/// entry is replaced by a fresh load.
#[derive(Clone)]
pub struct DatasetCache {
    entries: Cache<PathBuf, CachedFrame>,
}

impl DatasetCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity.max(1)),
        }
    }

    pub fn get_or_load(&self, path: &Path) -> Result<DataFrame, LoadError> {
        let modified = modification_time(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                debug!("Dataset cache hit for {}", path.display());
                return Ok(entry.frame);
            }
            info!("{} changed on disk, reloading", path.display());
        }

        let frame = load(path)?;
        self.entries.insert(
            path.to_path_buf(),
            CachedFrame {
                modified,
                frame: frame.clone(),
            },
        );
        Ok(frame)
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries.invalidate(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}

fn modification_time(path: &Path) -> Result<SystemTime, LoadError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LoadError::FileNotFound(path.to_path_buf())
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    metadata.modified().map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;

    const HEADER: &str = "Invoice ID,City,Customer_type,Gender,Product line,Unit price,Quantity,Total,Date,Time,Rating";

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sales_insights_{}_{}.csv", name, std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    fn set_modified(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn missing_file_is_reported() {
        let path = PathBuf::from("definitely/not/here.csv");
        assert!(matches!(load(&path), Err(LoadError::FileNotFound(p)) if p == path));

        let cache = DatasetCache::new(2);
        assert!(matches!(cache.get_or_load(&path), Err(LoadError::FileNotFound(_))));
    }

    #[test]
    fn empty_file_is_a_parse_error() {
        let path = temp_csv("empty", "");
        assert!(matches!(load(&path), Err(LoadError::Parse { .. })));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_and_infers_types() {
        let body = format!(
            "{}\n750-67-8428,Yangon,Member,Female,Health and beauty,74.69,7,548.9715,1/5/2019,13:08,9.1\n",
            HEADER
        );
        let path = temp_csv("infer", &body);

        let df = load(&path).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 11);
        assert_eq!(df.column("Total").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Date").unwrap().dtype(), &DataType::String);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn cache_reuses_until_modification_time_changes() {
        let one_row = format!(
            "{}\n750-67-8428,Yangon,Member,Female,Health and beauty,74.69,7,548.9715,1/5/2019,13:08,9.1\n",
            HEADER
        );
        let path = temp_csv("cache", &one_row);
        set_modified(&path, 1_000);

        let cache = DatasetCache::new(2);
        assert_eq!(cache.get_or_load(&path).unwrap().height(), 1);
        assert!(cache.contains(&path));

        // Same modification time: the cached frame is served even though the
        // contents differ.
        let two_rows = format!(
            "{}226-31-3081,Naypyitaw,Normal,Female,Electronic accessories,15.28,5,80.22,3/8/2019,10:29,9.6\n",
            one_row
        );
        std::fs::write(&path, &two_rows).unwrap();
        set_modified(&path, 1_000);
        assert_eq!(cache.get_or_load(&path).unwrap().height(), 1);

        set_modified(&path, 2_000);
        assert_eq!(cache.get_or_load(&path).unwrap().height(), 2);

        cache.invalidate(&path);
        assert!(!cache.contains(&path));
        std::fs::remove_file(path).ok();
    }
}
