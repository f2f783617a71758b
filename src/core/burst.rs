use crate::core::stats::nan_argmax;
use crate::types::{Axis, IntensityImage, MaxIntensityTrace, SpectroError, SpectroResult};
use ndarray::Array1;

/// Peak frequency of every time sample.
///
/// For column `i` the row holding the largest non-NaN value gives `freqs[i]` and
/// `time_channels[i] = i`. All-NaN columns map to row 0. The trace is marked as
/// fundamental emission; use [`MaxIntensityTrace::with_harmonic`] to change that.
pub fn extract_max_intensity_trace(data: &IntensityImage, freqs: &Axis) -> SpectroResult<MaxIntensityTrace> {
    if data.nrows() != freqs.len() {
        return Err(SpectroError::InvalidParameter(format!(
            "data has {} channels but {} frequencies were given",
            data.nrows(),
            freqs.len()
        )));
    }
    if data.nrows() == 0 {
        return Err(SpectroError::InvalidParameter("spectrogram has no channels".to_string()));
    }

    let rows: Vec<usize> = data
        .columns()
        .into_iter()
        .map(|column| nan_argmax(column.iter().copied()).unwrap_or(0))
        .collect();

    let peak_freqs: Array1<f64> = rows.iter().map(|&row| freqs[row]).collect();
    let time_channels: Array1<usize> = (0..rows.len()).collect();

    log::debug!("Extracted max-intensity trace over {} samples", rows.len());
    MaxIntensityTrace::new(time_channels, peak_freqs, false)
}
