use crate::errors::{
    Result,
    RidgePeaksError,
};

/// A single run's intensity trace.
///
/// Positions are acquisition indices. A modulated acquisition folds the
/// trace into a grid of `row_count` cycles with `row_length` points each,
/// so position `i` maps to `(i / row_length, i % row_length)`, that is
/// `(cycle_index, time_within_cycle)`.
///
/// A plain 1-D chromatogram is a trace whose `row_length` equals its length.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityTrace {
    intensities: Vec<f64>,
    retention_times: Vec<f64>,
    fingerprints: Option<Vec<Vec<f64>>>,
    row_length: usize,
}

impl IntensityTrace {
    pub fn new(
        intensities: Vec<f64>,
        retention_times: Vec<f64>,
        row_length: usize,
    ) -> Result<Self> {
        if row_length == 0 {
            return Err(RidgePeaksError::invalid(
                "row_length",
                0.0,
                "a trace needs at least one point per cycle",
            ));
        }
        if intensities.len() != retention_times.len() {
            return Err(RidgePeaksError::ExpectedSlicesSameLength {
                expected: intensities.len(),
                other: retention_times.len(),
                context: "intensities vs retention_times".to_string(),
            });
        }
        Ok(Self {
            intensities,
            retention_times,
            fingerprints: None,
            row_length,
        })
    }

    /// Builds a trace sampled at a constant interval, starting at time 0.
    pub fn with_uniform_sampling(
        intensities: Vec<f64>,
        row_length: usize,
        sampling_interval: f64,
    ) -> Result<Self> {
        if !(sampling_interval.is_finite() && sampling_interval > 0.0) {
            return Err(RidgePeaksError::invalid(
                "sampling_interval",
                sampling_interval,
                "sampling interval must be positive",
            ));
        }
        let retention_times = (0..intensities.len())
            .map(|i| i as f64 * sampling_interval)
            .collect();
        Self::new(intensities, retention_times, row_length)
    }

    /// Attaches one comparable profile (e.g. a mass spectrum) per position.
    pub fn with_fingerprints(mut self, fingerprints: Vec<Vec<f64>>) -> Result<Self> {
        if fingerprints.len() != self.intensities.len() {
            return Err(RidgePeaksError::ExpectedSlicesSameLength {
                expected: self.intensities.len(),
                other: fingerprints.len(),
                context: "intensities vs fingerprints".to_string(),
            });
        }
        self.fingerprints = Some(fingerprints);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn retention_times(&self) -> &[f64] {
        &self.retention_times
    }

    pub fn fingerprint(&self, position: usize) -> Option<&[f64]> {
        self.fingerprints
            .as_ref()
            .and_then(|f| f.get(position))
            .map(|f| f.as_slice())
    }

    pub fn row_length(&self) -> usize {
        self.row_length
    }

    pub fn row_count(&self) -> usize {
        self.intensities.len().div_ceil(self.row_length)
    }

    /// Maps a 1-D position to `(cycle_index, time_within_cycle)`.
    pub fn grid_coordinates(&self, position: usize) -> (usize, usize) {
        (position / self.row_length, position % self.row_length)
    }

    /// Linearly interpolated quantile of the intensities, `q` in `[0, 1]`.
    ///
    /// Returns `None` for an empty trace or an out of range `q`.
    ///
    /// # Example
    ///
    /// ```
    /// use ridgepeaks::IntensityTrace;
    ///
    /// let trace = IntensityTrace::with_uniform_sampling(vec![4.0, 1.0, 3.0, 2.0, 5.0], 5, 1.0).unwrap();
    /// assert_eq!(trace.percentile(0.5), Some(3.0));
    /// assert_eq!(trace.percentile(0.0), Some(1.0));
    /// assert_eq!(trace.percentile(1.0), Some(5.0));
    /// ```
    pub fn percentile(&self, q: f64) -> Option<f64> {
        interpolated_quantile(&self.intensities, q)
    }
}

/// Linearly interpolated quantile of the finite values, `None` when there
/// are none or `q` is outside `[0, 1]`.
pub(crate) fn interpolated_quantile(values: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
