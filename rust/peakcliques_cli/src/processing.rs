use indicatif::{
    ParallelProgressIterator,
    ProgressStyle,
};
use peakcliques::{
    CorrespondenceResult,
    RunPeaks,
    match_runs,
};
use rayon::prelude::*;
use ridgepeaks::{
    MexicanHatFilter,
    RidgePeaksError,
    RidgeRanker,
    RidgeTracker,
    RunId,
    Scaleogram,
};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

use crate::config::{
    Config,
    DetectionConfig,
    TraceRecord,
};
use crate::errors::CliError;

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub name: String,
    pub num_points: usize,
    pub num_peaks: usize,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub runs: Vec<RunSummary>,
    pub result: CorrespondenceResult,
}

pub fn read_traces(path: &Path) -> Result<Vec<TraceRecord>, CliError> {
    let file = std::fs::File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| CliError::ParseError { msg: e.to_string() })
}

/// Detects and ranks the peaks of a single run.
///
/// The significance threshold is a percentile of the scale 1 filter
/// response, the scale ridge roots are compared at. Only positive responses
/// count as peaks. An empty trace is reported as missing input so the
/// caller can keep the run with no peaks.
fn detect_run(
    run_id: RunId,
    record: &TraceRecord,
    config: &DetectionConfig,
) -> ridgepeaks::Result<RunPeaks> {
    let trace = record.to_trace()?;
    let roots = Scaleogram::compute(&MexicanHatFilter, trace.intensities(), 1)?;
    let threshold = roots
        .percentile(1, config.significance_percentile)
        .ok_or(RidgePeaksError::MissingInput {
            context: "empty or non-finite trace".to_string(),
        })?
        .max(f64::MIN_POSITIVE);
    let tracker = RidgeTracker::new(config.tracker_config(threshold))?;
    let ranker = RidgeRanker::new(config.ranking.clone())?;

    let ridges = tracker.track(&trace)?;
    let peaks = ranker.rank(run_id, &ridges, &trace)?;
    debug!(
        "Run {} ({}): threshold {:.3}, {} ridges, {} peaks",
        run_id,
        record.name,
        threshold,
        ridges.len(),
        peaks.len()
    );
    Ok(RunPeaks::new(run_id, peaks))
}

pub fn detect_peaks(
    records: &[TraceRecord],
    config: &DetectionConfig,
) -> Result<Vec<RunPeaks>, CliError> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;

    records
        .par_iter()
        .enumerate()
        .progress_with_style(style)
        .map(|(i, record)| {
            let run_id = i as RunId;
            let detected = detect_run(run_id, record, config)
                .map_err(|e| e.append_to_context(&format!(" in run {}", record.name)));
            match detected {
                Ok(run) => Ok(run),
                Err(e) if e.is_missing_input() => {
                    warn!("Run {} ({}) has no usable data: {}", run_id, record.name, e);
                    Ok(RunPeaks::new(run_id, Vec::new()))
                }
                Err(e) => Err(CliError::Detection { source: e }),
            }
        })
        .collect()
}

pub fn process(records: Vec<TraceRecord>, config: &Config) -> Result<Report, CliError> {
    let start = Instant::now();
    let runs = detect_peaks(&records, &config.detection)?;
    let total_peaks: usize = runs.iter().map(|r| r.peaks.len()).sum();
    info!(
        "Detected {} peaks over {} runs in {:?}",
        total_peaks,
        runs.len(),
        start.elapsed()
    );

    let summaries = records
        .iter()
        .zip(runs.iter())
        .map(|(record, run)| RunSummary {
            run_id: run.run_id,
            name: record.name.clone(),
            num_points: record.intensities.len(),
            num_peaks: run.peaks.len(),
        })
        .collect();

    let start = Instant::now();
    let similarity = config.correspondence.similarity.build();
    let result = match_runs(runs, similarity, &config.correspondence.params)?;
    info!(
        "Matched runs into {} cliques in {:?}, reference run: {}",
        result.cliques.len(),
        start.elapsed(),
        result.reference.reference_run
    );

    Ok(Report {
        runs: summaries,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, center: f64) -> TraceRecord {
        let intensities: Vec<f64> = (0..200)
            .map(|i| {
                let d = i as f64 - center;
                100.0 * (-(d * d) / 18.0).exp()
            })
            .collect();
        TraceRecord {
            name: name.to_string(),
            retention_times: (0..200).map(|i| i as f64 * 0.5).collect(),
            intensities,
            row_length: 200,
            fingerprints: None,
        }
    }

    #[test]
    fn test_empty_run_is_kept_without_peaks() {
        let mut empty = record("empty", 0.0);
        empty.intensities.clear();
        empty.retention_times.clear();
        let records = vec![record("a", 80.0), empty, record("b", 84.0)];

        let config: Config = serde_json::from_str(
            r#"{"correspondence": {"max_rt_difference": 5.0}, "detection": {"max_scale": 4}}"#,
        )
        .unwrap();
        let report = process(records, &config).unwrap();
        assert_eq!(report.runs.len(), 3);
        assert_eq!(report.runs[1].num_peaks, 0);
        assert_eq!(report.result.cliques.len(), 1);
        let clique = &report.result.cliques[0];
        assert_eq!(clique.run_ids().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_mismatched_lengths_abort() {
        let mut bad = record("bad", 50.0);
        bad.retention_times.pop();
        let config: Config = serde_json::from_str("{}").unwrap();
        let res = detect_peaks(&[bad], &config.detection);
        match res {
            Err(CliError::Detection { source }) => {
                assert!(matches!(
                    source,
                    RidgePeaksError::ExpectedSlicesSameLength { .. }
                ));
                assert!(source.to_string().contains("in run bad"), "{}", source);
            }
            other => panic!("expected a detection error, got {:?}", other),
        }
    }

    #[test]
    fn test_broad_peaks_are_detected() {
        // Broad bumps have a scale 1 response far below their raw intensity.
        let broad = |name: &str, center: f64| {
            let intensities: Vec<f64> = (0..201)
                .map(|i| {
                    let d = i as f64 - center;
                    100.0 * (-(d * d) / (2.0 * 8.0 * 8.0)).exp()
                })
                .collect();
            TraceRecord {
                name: name.to_string(),
                retention_times: (0..201).map(|i| i as f64).collect(),
                intensities,
                row_length: 201,
                fingerprints: None,
            }
        };
        let records = vec![broad("a", 100.0), broad("b", 100.0)];
        let config: Config = serde_json::from_str("{}").unwrap();
        let runs = detect_peaks(&records, &config.detection).unwrap();
        assert_eq!(runs.len(), 2);
        for run in runs.iter() {
            assert_eq!(run.peaks.len(), 1, "run {}", run.run_id);
            assert_eq!(run.peaks[0].apex_position, 100);
        }
    }
}
