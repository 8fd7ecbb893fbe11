use peakcliques::{
    CorrespondenceConfig,
    SimilarityKind,
};
use ridgepeaks::{
    IntensityTrace,
    RidgeRankerConfig,
    RidgeTrackerConfig,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub correspondence: CorrespondenceSection,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_scale: u32,
    pub max_scale: u32,
    /// Quantile of each trace's intensities used as the ridge
    /// significance threshold.
    pub significance_percentile: f64,
    pub adjacency_radius: f64,
    pub extension_radius: Option<usize>,
    pub ranking: RidgeRankerConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let tracker = RidgeTrackerConfig::default();
        Self {
            min_scale: tracker.min_scale,
            max_scale: tracker.max_scale,
            significance_percentile: 0.85,
            adjacency_radius: tracker.adjacency_radius,
            extension_radius: tracker.extension_radius,
            ranking: RidgeRankerConfig::default(),
        }
    }
}

impl DetectionConfig {
    pub fn tracker_config(&self, significance_threshold: f64) -> RidgeTrackerConfig {
        RidgeTrackerConfig {
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            significance_threshold,
            adjacency_radius: self.adjacency_radius,
            extension_radius: self.extension_radius,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CorrespondenceSection {
    pub similarity: SimilarityKind,
    #[serde(flatten)]
    pub params: CorrespondenceConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), CliError> {
        let p = self.detection.significance_percentile;
        if !(0.0..=1.0).contains(&p) {
            return Err(CliError::Config {
                source: format!("significance_percentile must be within [0, 1], got {}", p),
            });
        }
        if let SimilarityKind::GaussianRtCosine { rt_sigma } = self.correspondence.similarity {
            if !(rt_sigma.is_finite() && rt_sigma > 0.0) {
                return Err(CliError::Config {
                    source: format!("rt_sigma must be positive, got {}", rt_sigma),
                });
            }
        }
        self.correspondence
            .params
            .validate()
            .map_err(|e| CliError::Config {
                source: e.to_string(),
            })
    }
}

/// One run as found in the input file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TraceRecord {
    pub name: String,
    pub intensities: Vec<f64>,
    pub retention_times: Vec<f64>,
    pub row_length: usize,
    #[serde(default)]
    pub fingerprints: Option<Vec<Vec<f64>>>,
}

impl TraceRecord {
    pub fn to_trace(&self) -> ridgepeaks::Result<IntensityTrace> {
        let trace = IntensityTrace::new(
            self.intensities.clone(),
            self.retention_times.clone(),
            self.row_length,
        )?;
        match &self.fingerprints {
            Some(fps) => trace.with_fingerprints(fps.clone()),
            None => Ok(trace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: Config = serde_json::from_str(r#"{"input": "runs.json"}"#).unwrap();
        assert_eq!(config.input, Some(PathBuf::from("runs.json")));
        assert_eq!(config.detection.significance_percentile, 0.85);
        assert_eq!(config.correspondence.params.min_clique_size, -1);
        assert_eq!(config.correspondence.similarity, SimilarityKind::RtDifference);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let raw = r#"{
            "input": null,
            "detection": {
                "max_scale": 6,
                "significance_percentile": 0.5,
                "ranking": {"criteria": ["ridge_cost", "response"], "top_k": 10}
            },
            "correspondence": {
                "similarity": {"type": "gaussian_rt_cosine", "rt_sigma": 0.0},
                "max_rt_difference": 5.0,
                "min_clique_size": 3
            }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.detection.max_scale, 6);
        assert_eq!(config.detection.min_scale, 1);
        assert_eq!(config.detection.ranking.top_k, 10);
        assert_eq!(config.detection.ranking.criteria.len(), 2);
        assert_eq!(config.correspondence.params.max_rt_difference, 5.0);
        assert_eq!(config.correspondence.params.min_clique_size, 3);
        // A zero sigma would divide by zero.
        assert!(matches!(config.validate(), Err(CliError::Config { .. })));
    }
}
