use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::services::sales::segments::SegmentBins;

const DEFAULT_DATA_PATH: &str = "data/supermarket_sales.csv";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

const DEFAULT_CACHE_CAPACITY: u64 = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub cache_capacity: u64,
    pub revenue_bins: SegmentBins,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_path = lookup("SALES_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let bind_addr = lookup("SALES_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid SALES_BIND_ADDR: {}", e))?;

        let cache_capacity = match lookup("SALES_CACHE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid SALES_CACHE_CAPACITY '{}': {}", raw, e))?,
            None => DEFAULT_CACHE_CAPACITY,
        };

        let revenue_bins = match lookup("SALES_REVENUE_EDGES") {
            Some(raw) => parse_revenue_edges(&raw)?,
            None => SegmentBins::default(),
        };

        Ok(Config {
            data_path,
            bind_addr,
            cache_capacity,
            revenue_bins,
        })
    }
}

/// Parses the inner segment edges, e.g. `100,300,500`. The outer edges stay
/// at zero and infinity and the default labels are kept.
fn parse_revenue_edges(raw: &str) -> Result<SegmentBins> {
    let inner = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("Invalid SALES_REVENUE_EDGES value '{}': {}", part.trim(), e))
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut edges = Vec::with_capacity(inner.len() + 2);
    edges.push(0.0);
    edges.extend(inner);
    edges.push(f64::INFINITY);

    let bins = SegmentBins::new(edges, SegmentBins::default().labels)
        .map_err(|e| anyhow::anyhow!("Invalid SALES_REVENUE_EDGES: {}", e))?;
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.revenue_bins, SegmentBins::default());
    }

    #[test]
    fn revenue_edges_override_inner_edges() {
        let config = Config::from_lookup(lookup_from(&[("SALES_REVENUE_EDGES", "50, 250, 750")])).unwrap();
        assert_eq!(config.revenue_bins.edges, vec![0.0, 50.0, 250.0, 750.0, f64::INFINITY]);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[("SALES_CACHE_CAPACITY", "lots")])).unwrap_err();
        assert!(err.to_string().contains("SALES_CACHE_CAPACITY"));

        let err = Config::from_lookup(lookup_from(&[("SALES_REVENUE_EDGES", "300,100,500")])).unwrap_err();
        assert!(err.to_string().contains("SALES_REVENUE_EDGES"));
    }
}
