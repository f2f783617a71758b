//! Radio-frequency interference cleaning for dynamic spectra.
//!
//! The cleaner smooths the matrix with a 2-D median filter, flags channels whose
//! level and variability stand out from the rest of the band, rebuilds those
//! channels from their neighbours and finally clips each channel's high tail.
//! Low values are never clipped so burst morphology is preserved.

use crate::core::stats::{median_abs_deviation, nan_median, nan_percentile, nan_std};
use crate::types::{IntensityImage, RfiResult, SpectroError, SpectroResult};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Scale that makes the MAD a consistent estimator of the standard deviation
const MAD_SCALE: f64 = 0.6745;

/// RFI cleaning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfiParams {
    pub enabled: bool,
    /// Median window along time (columns), forced odd
    pub kernel_time: usize,
    /// Median window along frequency (rows), forced odd
    pub kernel_freq: usize,
    /// Robust z-score above which a channel is flagged
    pub channel_z_threshold: f64,
    /// Per-channel upper percentile; values outside (0, 100) disable clipping
    pub percentile_clip: f64,
}

impl Default for RfiParams {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel_time: 3,
            kernel_freq: 3,
            channel_z_threshold: 6.0,
            percentile_clip: 99.5,
        }
    }
}

/// Serializable record of a cleaning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfiReport {
    pub enabled: bool,
    pub kernel_time: usize,
    pub kernel_freq: usize,
    pub channel_z_threshold: f64,
    pub percentile_clip: f64,
    pub masked_channel_indices: Vec<usize>,
    pub applied: bool,
}

impl RfiReport {
    pub fn new(params: &RfiParams, result: &RfiResult) -> Self {
        Self {
            enabled: params.enabled,
            kernel_time: params.kernel_time,
            kernel_freq: params.kernel_freq,
            channel_z_threshold: params.channel_z_threshold,
            percentile_clip: params.percentile_clip,
            masked_channel_indices: result.masked_channel_indices.clone(),
            applied: params.enabled,
        }
    }
}

/// RFI cleaner processor
pub struct RfiCleaner {
    params: RfiParams,
}

impl RfiCleaner {
    pub fn new() -> Self {
        Self {
            params: RfiParams::default(),
        }
    }

    pub fn with_params(params: RfiParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RfiParams {
        &self.params
    }

    /// Clean a (frequency x time) matrix. The input is never modified.
    pub fn clean(&self, data: &IntensityImage) -> SpectroResult<RfiResult> {
        if !self.params.enabled {
            log::debug!("RFI cleaning disabled, returning a copy");
            return Ok(RfiResult {
                data: data.clone(),
                masked_channel_indices: Vec::new(),
            });
        }
        if self.params.channel_z_threshold.is_nan() {
            return Err(SpectroError::InvalidParameter(
                "channel_z_threshold must not be NaN".to_string(),
            ));
        }

        let kernel_freq = ensure_odd(self.params.kernel_freq);
        let kernel_time = ensure_odd(self.params.kernel_time);
        log::debug!(
            "RFI cleaning: kernel {}x{} (freq x time), z > {}, clip at {}th percentile",
            kernel_freq,
            kernel_time,
            self.params.channel_z_threshold,
            self.params.percentile_clip
        );

        let mut cleaned = median_filter(data, kernel_freq, kernel_time);
        let masked = hot_channels(data, self.params.channel_z_threshold);
        repair_channels(&mut cleaned, &masked);
        clip_high_tail(&mut cleaned, self.params.percentile_clip);

        if !masked.is_empty() {
            log::info!("RFI cleaning masked {} channel(s): {:?}", masked.len(), masked);
        }

        Ok(RfiResult {
            data: cleaned,
            masked_channel_indices: masked,
        })
    }
}

impl Default for RfiCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// One-call form of [`RfiCleaner::clean`]
pub fn clean_rfi(
    data: &IntensityImage,
    kernel_time: usize,
    kernel_freq: usize,
    channel_z_threshold: f64,
    percentile_clip: f64,
    enabled: bool,
) -> SpectroResult<RfiResult> {
    RfiCleaner::with_params(RfiParams {
        enabled,
        kernel_time,
        kernel_freq,
        channel_z_threshold,
        percentile_clip,
    })
    .clean(data)
}

fn ensure_odd(size: usize) -> usize {
    let size = size.max(1);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Median of one output pixel; out-of-range taps repeat the nearest edge sample
fn median_at(
    image: &IntensityImage,
    (i, j): (usize, usize),
    kernel_freq: usize,
    kernel_time: usize,
    window: &mut Vec<f32>,
) -> f32 {
    let (height, width) = image.dim();
    let half_freq = (kernel_freq / 2) as isize;
    let half_time = (kernel_time / 2) as isize;

    window.clear();
    for di in -half_freq..=half_freq {
        let ii = (i as isize + di).clamp(0, height as isize - 1) as usize;
        for dj in -half_time..=half_time {
            let jj = (j as isize + dj).clamp(0, width as isize - 1) as usize;
            window.push(image[[ii, jj]]);
        }
    }
    nan_median(window.as_slice()).unwrap_or(f32::NAN)
}

fn median_row(image: &IntensityImage, i: usize, kernel_freq: usize, kernel_time: usize) -> Vec<f32> {
    let mut window = Vec::with_capacity(kernel_freq * kernel_time);
    (0..image.ncols())
        .map(|j| median_at(image, (i, j), kernel_freq, kernel_time, &mut window))
        .collect()
}

/// 2-D median filter with "nearest" edge handling
#[cfg(feature = "parallel")]
fn median_filter(image: &IntensityImage, kernel_freq: usize, kernel_time: usize) -> IntensityImage {
    use rayon::prelude::*;

    let (height, width) = image.dim();
    let rows: Vec<Vec<f32>> = (0..height)
        .into_par_iter()
        .map(|i| median_row(image, i, kernel_freq, kernel_time))
        .collect();

    let mut filtered = Array2::zeros((height, width));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, value) in row.into_iter().enumerate() {
            filtered[[i, j]] = value;
        }
    }
    filtered
}

#[cfg(not(feature = "parallel"))]
fn median_filter(image: &IntensityImage, kernel_freq: usize, kernel_time: usize) -> IntensityImage {
    let (height, width) = image.dim();
    let mut filtered = Array2::zeros((height, width));
    for i in 0..height {
        for (j, value) in median_row(image, i, kernel_freq, kernel_time).into_iter().enumerate() {
            filtered[[i, j]] = value;
        }
    }
    filtered
}

/// `|median(row)| + median(|row - median(row)|)`
fn channel_score(row: ArrayView1<f32>) -> f64 {
    let values: Vec<f64> = row.iter().map(|&v| f64::from(v)).collect();
    match nan_median(&values) {
        Some(center) => {
            let spread = median_abs_deviation(&values, center).unwrap_or(f64::NAN);
            center.abs() + spread
        }
        None => f64::NAN,
    }
}

/// Robust z-scores; degenerate spreads fall back to the standard deviation and
/// then to an infinite score for any channel that deviates at all.
fn robust_z(scores: &[f64]) -> Vec<f64> {
    let center = match nan_median(scores) {
        Some(center) => center,
        None => return vec![f64::NAN; scores.len()],
    };
    let mad = median_abs_deviation(scores, center).unwrap_or(f64::NAN);
    if mad.is_finite() && mad > 0.0 {
        return scores.iter().map(|s| MAD_SCALE * (s - center) / mad).collect();
    }

    let std = nan_std(scores).unwrap_or(f64::NAN);
    if std.is_finite() && std > 0.0 {
        return scores.iter().map(|s| (s - center) / std).collect();
    }

    scores
        .iter()
        .map(|s| if (s - center).abs() > 0.0 { f64::INFINITY } else { 0.0 })
        .collect()
}

/// Rows whose robust z-score exceeds the threshold, ascending
fn hot_channels(data: &IntensityImage, threshold: f64) -> Vec<usize> {
    if data.nrows() == 0 {
        return Vec::new();
    }
    let scores: Vec<f64> = data.rows().into_iter().map(channel_score).collect();
    robust_z(&scores)
        .into_iter()
        .enumerate()
        .filter(|(_, z)| *z > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Rebuild flagged rows in ascending order, reading already repaired rows
fn repair_channels(image: &mut IntensityImage, masked: &[usize]) {
    let n_rows = image.nrows();
    for &idx in masked {
        let replacement = if idx == 0 {
            if n_rows > 1 {
                image.row(1).to_owned()
            } else {
                continue;
            }
        } else if idx >= n_rows - 1 {
            image.row(n_rows - 2).to_owned()
        } else {
            (&image.row(idx - 1) + &image.row(idx + 1)) * 0.5f32
        };
        image.row_mut(idx).assign(&replacement);
    }
}

fn clip_high_tail(image: &mut IntensityImage, percentile: f64) {
    if !(percentile > 0.0 && percentile < 100.0) {
        return;
    }
    for mut row in image.rows_mut() {
        let values: Vec<f32> = row.to_vec();
        if let Some(limit) = nan_percentile(&values, percentile) {
            row.mapv_inplace(|v| if v > limit { limit } else { v });
        }
    }
}
