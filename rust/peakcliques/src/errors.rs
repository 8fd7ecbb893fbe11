use ridgepeaks::{
    PeakId,
    RunId,
};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum CorrespondenceError {
    NonFiniteScore {
        run_a: RunId,
        peak_a: PeakId,
        run_b: RunId,
        peak_b: PeakId,
        value: f64,
    },
    InvalidParameter {
        name: &'static str,
        value: f64,
        context: String,
    },
    DuplicateRun {
        run_id: RunId,
    },
    DuplicatePeak {
        run_id: RunId,
        peak_id: PeakId,
    },
    UnknownPeak {
        run_id: RunId,
        peak_id: PeakId,
    },
    UnknownRun {
        run_id: RunId,
    },
}

impl CorrespondenceError {
    pub(crate) fn invalid(name: &'static str, value: f64, context: &str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            context: context.to_string(),
        }
    }
}

impl Display for CorrespondenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrespondenceError::NonFiniteScore {
                run_a,
                peak_a,
                run_b,
                peak_b,
                value,
            } => write!(
                f,
                "Similarity between peak {} of run {} and peak {} of run {} is not finite ({})",
                peak_a, run_a, peak_b, run_b, value
            ),
            CorrespondenceError::InvalidParameter {
                name,
                value,
                context,
            } => write!(f, "Invalid value {} for parameter `{}` ({})", value, name, context),
            CorrespondenceError::DuplicateRun { run_id } => {
                write!(f, "Run {} was provided more than once", run_id)
            }
            CorrespondenceError::DuplicatePeak { run_id, peak_id } => {
                write!(f, "Peak id {} is repeated within run {}", peak_id, run_id)
            }
            CorrespondenceError::UnknownPeak { run_id, peak_id } => {
                write!(f, "No peak {} in run {}", peak_id, run_id)
            }
            CorrespondenceError::UnknownRun { run_id } => write!(f, "No run {}", run_id),
        }
    }
}

impl std::error::Error for CorrespondenceError {}

pub type Result<T> = std::result::Result<T, CorrespondenceError>;
