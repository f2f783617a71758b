//! NaN-ignoring order statistics shared by the cleaning and kinematics stages.
//!
//! Every function skips NaN entries; `None` means no non-NaN value was left.

use num_traits::Float;
use std::cmp::Ordering;

/// Non-NaN values in ascending order
fn sorted_valid<T: Float>(values: &[T]) -> Vec<T> {
    let mut valid: Vec<T> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    valid
}

/// Linear interpolation between closest ranks of an ascending slice
fn interpolate_sorted<T: Float>(sorted: &[T], q: f64) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = T::from(rank - lower as f64)?;
    if lower == upper {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn nan_median<T: Float>(values: &[T]) -> Option<T> {
    interpolate_sorted(&sorted_valid(values), 50.0)
}

/// `q`-th percentile (0..=100) with linear interpolation
pub fn nan_percentile<T: Float>(values: &[T], q: f64) -> Option<T> {
    interpolate_sorted(&sorted_valid(values), q)
}

pub fn nan_mean<T: Float>(values: &[T]) -> Option<T> {
    let mut sum = T::zero();
    let mut count = 0usize;
    for &v in values.iter().filter(|v| !v.is_nan()) {
        sum = sum + v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum / T::from(count)?)
}

/// Population standard deviation (divides by `n`)
pub fn nan_std<T: Float>(values: &[T]) -> Option<T> {
    let mean = nan_mean(values)?;
    let deviations: Vec<T> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| (v - mean) * (v - mean))
        .collect();
    nan_mean(&deviations).map(|var| var.sqrt())
}

/// Median absolute deviation around `center`
pub fn median_abs_deviation<T: Float>(values: &[T], center: T) -> Option<T> {
    let deviations: Vec<T> = values.iter().map(|&v| (v - center).abs()).collect();
    nan_median(&deviations)
}

/// Index of the largest non-NaN value; ties resolve to the first index
pub fn nan_argmax<T: Float>(values: impl IntoIterator<Item = T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
