//! Scale-space filtering with the second derivative of a Gaussian
//! (the "Mexican hat" / Ricker wavelet).

use crate::errors::{
    Result,
    RidgePeaksError,
};
use crate::trace::interpolated_quantile;
use std::f64::consts::PI;

/// Kernel support on each side of the center, in multiples of the scale.
const KERNEL_HALF_WIDTH_SIGMAS: f64 = 5.0;

/// Convolves a signal with a Mexican-hat kernel of a given width.
///
/// Responses have the same length as the input; the signal is zero padded
/// at both ends.
///
/// # Example
///
/// ```
/// use ridgepeaks::MexicanHatFilter;
///
/// let signal = vec![0.0, 0.0, 1.0, 4.0, 1.0, 0.0, 0.0];
/// let response = MexicanHatFilter.apply(&signal, 1.0).unwrap();
/// assert_eq!(response.len(), signal.len());
/// let apex = response
///     .iter()
///     .enumerate()
///     .max_by(|a, b| a.1.total_cmp(b.1))
///     .map(|(i, _)| i);
/// assert_eq!(apex, Some(3));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MexicanHatFilter;

impl MexicanHatFilter {
    /// Samples the kernel on integer offsets `-h..=h`, `h = ceil(5 * scale)`.
    pub fn kernel(scale: f64) -> Result<Vec<f64>> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RidgePeaksError::invalid(
                "scale",
                scale,
                "wavelet scale must be positive and finite",
            ));
        }
        let half_width = (KERNEL_HALF_WIDTH_SIGMAS * scale).ceil() as i64;
        let norm = 2.0 / ((3.0 * scale).sqrt() * PI.powf(0.25));
        let sigma_sq = scale * scale;

        Ok((-half_width..=half_width)
            .map(|t| {
                let t_sq = (t * t) as f64;
                norm * (1.0 - t_sq / sigma_sq) * (-t_sq / (2.0 * sigma_sq)).exp()
            })
            .collect())
    }

    pub fn apply(&self, signal: &[f64], scale: f64) -> Result<Vec<f64>> {
        let kernel = Self::kernel(scale)?;
        Ok(convolve_same(signal, &kernel))
    }
}

/// Zero padded convolution returning as many values as `signal` has.
/// `kernel` must have an odd length.
fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let half = kernel.len() / 2;
    let mut out = vec![0.0; n];

    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (j, k) in kernel.iter().enumerate() {
            // Signal index i + j - half, skipped when it falls in the padding.
            let idx = i + j;
            if idx < half {
                continue;
            }
            let x_idx = idx - half;
            if x_idx >= n {
                break;
            }
            acc += signal[x_idx] * k;
        }
        *out_i = acc;
    }
    out
}

/// Dense scale x position matrix of filter responses.
///
/// Row `s - 1` holds the response at integer scale `s`, so values of the
/// same scale are adjacent in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaleogram {
    values: Vec<f64>,
    num_positions: usize,
    max_scale: u32,
}

impl Scaleogram {
    pub fn compute(filter: &MexicanHatFilter, signal: &[f64], max_scale: u32) -> Result<Self> {
        if max_scale == 0 {
            return Err(RidgePeaksError::invalid(
                "max_scale",
                0.0,
                "a scaleogram needs at least one scale",
            ));
        }
        let num_positions = signal.len();
        let mut values = Vec::with_capacity(num_positions * max_scale as usize);
        for scale in 1..=max_scale {
            values.extend(filter.apply(signal, scale as f64)?);
        }
        Ok(Self {
            values,
            num_positions,
            max_scale,
        })
    }

    /// Response at integer scale `scale` (1-based).
    pub fn response(&self, scale: u32) -> Option<&[f64]> {
        if scale == 0 || scale > self.max_scale {
            return None;
        }
        let start = (scale as usize - 1) * self.num_positions;
        Some(&self.values[start..start + self.num_positions])
    }

    pub fn get(&self, scale: u32, position: usize) -> Option<f64> {
        self.response(scale).and_then(|r| r.get(position)).copied()
    }

    /// Interpolated `q` quantile of the responses at `scale`.
    ///
    /// Ridge roots live at scale 1, so `percentile(1, q)` is in the same
    /// units as [`crate::RidgeTrackerConfig::significance_threshold`].
    pub fn percentile(&self, scale: u32, q: f64) -> Option<f64> {
        self.response(scale).and_then(|r| interpolated_quantile(r, q))
    }

    pub fn max_scale(&self) -> u32 {
        self.max_scale
    }

    pub fn num_positions(&self) -> usize {
        self.num_positions
    }
}
