use crate::core::stats::nan_mean;
use crate::types::IntensityImage;
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Receiver digits to dB-like units: 2500 mV over 255 digits at 25.4 mV/dB
pub const DIGITS_TO_DB: f32 = 2500.0 / 255.0 / 25.4;

/// Noise reduction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub clip_low: f32,
    pub clip_high: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            clip_low: -5.0,
            clip_high: 20.0,
        }
    }
}

/// Subtract each channel's mean level. NaN samples are ignored when averaging.
pub fn subtract_mean_background(data: &IntensityImage) -> IntensityImage {
    let mut out = data.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let values = row.to_vec();
        if let Some(mean) = nan_mean(&values) {
            row.mapv_inplace(|v| v - mean);
        }
    }
    out
}

/// Background subtraction, clipping to `[clip_low, clip_high]` and conversion to dB-like units
pub fn reduce_noise(data: &IntensityImage, params: &NoiseParams) -> IntensityImage {
    log::debug!("Reducing noise, clip range [{}, {}]", params.clip_low, params.clip_high);
    subtract_mean_background(data).mapv(|v| {
        if v.is_nan() {
            v
        } else {
            v.max(params.clip_low).min(params.clip_high) * DIGITS_TO_DB
        }
    })
}
