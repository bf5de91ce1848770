use thiserror::Error;

pub const DEFAULT_REVENUE_EDGES: [f64; 5] = [0.0, 100.0, 300.0, 500.0, f64::INFINITY];
pub const DEFAULT_REVENUE_LABELS: [&str; 4] = ["Small", "Medium", "Large", "VeryLarge"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentBinsError {
    #[error("at least two edges are required, got {0}")]
    TooFewEdges(usize),
    #[error("{edges} edges need {} labels, got {labels}", edges - 1)]
    LabelCount { edges: usize, labels: usize },
    #[error("edges must be strictly increasing (edge {index} is {value})")]
    NotIncreasing { index: usize, value: f64 },
}

/// Revenue segment bins. Each bin is `(edges[i], edges[i + 1]]`: lower edge
/// exclusive, upper edge inclusive. Values at or below the first edge fall
/// outside every bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBins {
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
}

impl Default for SegmentBins {
    fn default() -> Self {
        Self {
            edges: DEFAULT_REVENUE_EDGES.to_vec(),
            labels: DEFAULT_REVENUE_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl SegmentBins {
    pub fn new(edges: Vec<f64>, labels: Vec<String>) -> Result<Self, SegmentBinsError> {
        let bins = Self { edges, labels };
        bins.validate()?;
        Ok(bins)
    }

    pub fn validate(&self) -> Result<(), SegmentBinsError> {
        if self.edges.len() < 2 {
            return Err(SegmentBinsError::TooFewEdges(self.edges.len()));
        }
        if self.labels.len() != self.edges.len() - 1 {
            return Err(SegmentBinsError::LabelCount {
                edges: self.edges.len(),
                labels: self.labels.len(),
            });
        }
        for (index, pair) in self.edges.windows(2).enumerate() {
            // NaN fails this comparison too
            if !(pair[1] > pair[0]) {
                return Err(SegmentBinsError::NotIncreasing {
                    index: index + 1,
                    value: pair[1],
                });
            }
        }
        Ok(())
    }

    /// Label of the bin holding `value`, or `None` when it is outside every bin.
    pub fn assign(&self, value: f64) -> Option<&str> {
        self.edges
            .windows(2)
            .zip(self.labels.iter())
            .find(|(pair, _)| value > pair[0] && value <= pair[1])
            .map(|(_, label)| label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_boundaries() {
        let bins = SegmentBins::default();
        assert_eq!(bins.assign(0.0), None);
        assert_eq!(bins.assign(-12.5), None);
        assert_eq!(bins.assign(0.01), Some("Small"));
        assert_eq!(bins.assign(100.0), Some("Small"));
        assert_eq!(bins.assign(100.01), Some("Medium"));
        assert_eq!(bins.assign(300.0), Some("Medium"));
        assert_eq!(bins.assign(300.5), Some("Large"));
        assert_eq!(bins.assign(500.0), Some("Large"));
        assert_eq!(bins.assign(500.01), Some("VeryLarge"));
        assert_eq!(bins.assign(1_042.65), Some("VeryLarge"));
        assert_eq!(bins.assign(f64::NAN), None);
    }

    #[test]
    fn every_positive_value_lands_in_exactly_one_bin() {
        let bins = SegmentBins::default();
        for cents in 1..=120_000 {
            let value = cents as f64 / 100.0;
            let hits = bins
                .edges
                .windows(2)
                .filter(|pair| value > pair[0] && value <= pair[1])
                .count();
            assert_eq!(hits, 1, "value {} matched {} bins", value, hits);
            assert!(bins.assign(value).is_some());
        }
    }

    #[test]
    fn custom_bins() {
        let bins = SegmentBins::new(
            vec![10.0, 20.0, 30.0],
            vec!["low".to_string(), "high".to_string()],
        )
        .unwrap();
        assert_eq!(bins.assign(10.0), None);
        assert_eq!(bins.assign(15.0), Some("low"));
        assert_eq!(bins.assign(30.0), Some("high"));
        assert_eq!(bins.assign(30.1), None);
    }

    #[test]
    fn invalid_bins_are_rejected() {
        assert_eq!(
            SegmentBins::new(vec![1.0], vec![]).unwrap_err(),
            SegmentBinsError::TooFewEdges(1)
        );
        assert_eq!(
            SegmentBins::new(vec![0.0, 1.0, 2.0], vec!["a".to_string()]).unwrap_err(),
            SegmentBinsError::LabelCount { edges: 3, labels: 1 }
        );
        assert!(matches!(
            SegmentBins::new(vec![0.0, 5.0, 5.0], vec!["a".to_string(), "b".to_string()]),
            Err(SegmentBinsError::NotIncreasing { index: 2, .. })
        ));
    }
}
