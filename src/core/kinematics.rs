//! Type II burst kinematics.
//!
//! A max-intensity trace is fitted with the power law `f(t) = a * t^b` by
//! Levenberg-Marquardt least squares. The fit gives a drift rate
//! `D(t) = a * b * t^(b - 1)`, and the Newkirk coronal density model turns
//! frequency and drift into shock height and speed:
//!
//! ```text
//! L(f)     = ln(f^2 / (n * 3.385))
//! speed(t) = 13853221.38 * |D(t)| / (f(t) * L^2)     km/s
//! height   = 4.32 * ln(10) / L                        solar radii
//! ```
//!
//! `n` is the Newkirk fold (1..=4). Changing it only needs a new
//! [`DriftProfile::shock_summary`], never a new fit.

use crate::core::stats::{nan_mean, nan_percentile, nan_std};
use crate::types::{FitResult, MaxIntensityTrace, ShockSummary, SpectroError, SpectroResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;

/// Newkirk model speed coefficient (km/s)
const SPEED_COEFF: f64 = 13853221.38;
/// Base electron-density term of the Newkirk model in MHz^2
const NEWKIRK_BASE: f64 = 3.385;
const HEIGHT_COEFF: f64 = 4.32;
/// Percentile of the trace frequencies taken as the burst start
const START_PERCENTILE: f64 = 90.0;
const MIN_FIT_SAMPLES: usize = 3;
const MAX_DAMPING: f64 = 1e16;

/// Kinematics fitting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsParams {
    /// Duration of one time sample in seconds
    pub seconds_per_sample: f64,
    /// Solver iteration cap
    pub max_iterations: usize,
    /// Relative SSE improvement below which the fit has converged
    pub ftol: f64,
    /// Relative parameter step below which the fit has converged
    pub xtol: f64,
}

impl Default for KinematicsParams {
    fn default() -> Self {
        Self {
            seconds_per_sample: 0.25,
            max_iterations: 10000,
            ftol: 1e-12,
            xtol: 1e-12,
        }
    }
}

/// Power-law fitter and shock-parameter calculator
pub struct BurstKinematicsFitter {
    params: KinematicsParams,
}

impl BurstKinematicsFitter {
    pub fn new() -> Self {
        Self {
            params: KinematicsParams::default(),
        }
    }

    pub fn with_params(params: KinematicsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KinematicsParams {
        &self.params
    }

    /// Fit `f(t) = a * t^b` to a trace.
    ///
    /// `harmonic` does not change the fit; halving applies to the start frequency
    /// picked by [`DriftProfile::shock_summary`].
    pub fn fit_burst(
        &self,
        time_channels: &Array1<usize>,
        freqs: &Array1<f64>,
        harmonic: bool,
    ) -> SpectroResult<FitResult> {
        let (t, f) = usable_samples(time_channels, freqs, self.params.seconds_per_sample)?;
        if t.len() < MIN_FIT_SAMPLES {
            return Err(SpectroError::Fit(format!(
                "need at least {} usable samples, got {}",
                MIN_FIT_SAMPLES,
                t.len()
            )));
        }
        log::debug!("Fitting {} samples (harmonic: {})", t.len(), harmonic);

        let (a0, b0) = initial_guess(&t, &f);
        let (a, b, iterations) = self.levenberg_marquardt(&t, &f, a0, b0)?;

        let sse = sum_squares(&t, &f, a, b);
        let (jtj, _) = normal_equations(&t, &f, a, b);
        let inverse = invert_2x2(&jtj)
            .ok_or_else(|| SpectroError::Fit("singular Jacobian at the solution".to_string()))?;
        let scale = sse / (t.len() - 2) as f64;
        let std_errs = [(inverse[0][0] * scale).sqrt(), (inverse[1][1] * scale).sqrt()];

        let (r2, rmse) = goodness_of_fit(&t, &f, a, b);
        let fit = FitResult { a, b, std_errs, r2, rmse };
        log::info!(
            "Burst fit converged after {} iterations: {} (R² = {:.4}, RMSE = {:.4})",
            iterations,
            fit.equation(),
            r2,
            rmse
        );
        Ok(fit)
    }

    pub fn fit_trace(&self, trace: &MaxIntensityTrace) -> SpectroResult<FitResult> {
        self.fit_burst(&trace.time_channels, &trace.freqs, trace.harmonic)
    }

    /// Per-sample drift and errors for a fitted trace
    pub fn drift_profile(&self, fit: &FitResult, trace: &MaxIntensityTrace) -> SpectroResult<DriftProfile> {
        DriftProfile::from_fit(fit, trace, &self.params)
    }

    /// Returns `(a, b, iterations)`
    fn levenberg_marquardt(&self, t: &[f64], f: &[f64], a0: f64, b0: f64) -> SpectroResult<(f64, f64, usize)> {
        let (mut a, mut b) = (a0, b0);
        let mut sse = sum_squares(t, f, a, b);
        if !sse.is_finite() {
            return Err(SpectroError::Fit("initial guess gives a non-finite residual".to_string()));
        }
        let mut lambda = 1e-3;

        for iteration in 0..self.params.max_iterations {
            if sse == 0.0 {
                return Ok((a, b, iteration));
            }

            let (jtj, jtr) = normal_equations(t, f, a, b);
            let damped = [
                [jtj[0][0] * (1.0 + lambda), jtj[0][1]],
                [jtj[1][0], jtj[1][1] * (1.0 + lambda)],
            ];
            let step = invert_2x2(&damped).map(|inv| {
                (
                    inv[0][0] * jtr[0] + inv[0][1] * jtr[1],
                    inv[1][0] * jtr[0] + inv[1][1] * jtr[1],
                )
            });

            let candidate = step
                .filter(|(da, db)| da.is_finite() && db.is_finite())
                .map(|(da, db)| (a + da, b + db, da, db))
                .map(|(na, nb, da, db)| (na, nb, da, db, sum_squares(t, f, na, nb)));

            match candidate {
                Some((na, nb, da, db, new_sse)) if new_sse.is_finite() && new_sse < sse => {
                    let improvement = sse - new_sse;
                    let small_step = da.abs() <= self.params.xtol * (a.abs() + self.params.xtol)
                        && db.abs() <= self.params.xtol * (b.abs() + self.params.xtol);
                    a = na;
                    b = nb;
                    sse = new_sse;
                    lambda = (lambda / 10.0).max(1e-15);
                    if improvement <= self.params.ftol * sse || small_step {
                        return Ok((a, b, iteration + 1));
                    }
                }
                _ => {
                    lambda *= 10.0;
                    if lambda > MAX_DAMPING {
                        // no downhill step left at this point
                        return Ok((a, b, iteration + 1));
                    }
                }
            }
        }

        Err(SpectroError::Fit(format!(
            "no convergence within {} iterations",
            self.params.max_iterations
        )))
    }
}

impl Default for BurstKinematicsFitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Drift rates and their errors along a fitted trace.
///
/// Computed once per fit; shock parameters for any fold derive from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftProfile {
    /// Seconds
    pub time: Vec<f64>,
    /// MHz
    pub freqs: Vec<f64>,
    /// MHz/s
    pub drift: Vec<f64>,
    pub drift_err: Vec<f64>,
    /// Population std of the fit residuals (MHz)
    pub freq_err: f64,
    pub fundamental: bool,
    pub harmonic: bool,
}

impl DriftProfile {
    pub fn from_fit(fit: &FitResult, trace: &MaxIntensityTrace, params: &KinematicsParams) -> SpectroResult<Self> {
        let (time, freqs) = usable_samples(&trace.time_channels, &trace.freqs, params.seconds_per_sample)?;
        if time.is_empty() {
            return Err(SpectroError::InvalidParameter("trace has no usable samples".to_string()));
        }

        let residuals: Vec<f64> = time
            .iter()
            .zip(&freqs)
            .map(|(&t, &f)| f - fit.evaluate(t))
            .collect();
        let freq_err = nan_std(&residuals).unwrap_or(f64::NAN);

        let relative = ((fit.std_errs[0] / fit.a).powi(2) + (fit.std_errs[1] / fit.b).powi(2)).sqrt();
        let drift: Vec<f64> = time.iter().map(|&t| fit.drift_rate(t)).collect();
        let drift_err = drift.iter().map(|d| d.abs() * relative).collect();

        Ok(Self {
            time,
            freqs,
            drift,
            drift_err,
            freq_err,
            fundamental: trace.fundamental,
            harmonic: trace.harmonic,
        })
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    pub fn shock_speeds(&self, fold: u8) -> SpectroResult<Vec<f64>> {
        let denom = newkirk_denominator(fold)?;
        Ok(self
            .freqs
            .iter()
            .zip(&self.drift)
            .map(|(&f, &d)| shock_speed(f, d, denom))
            .collect())
    }

    pub fn shock_heights(&self, fold: u8) -> SpectroResult<Vec<f64>> {
        let denom = newkirk_denominator(fold)?;
        Ok(self.freqs.iter().map(|&f| shock_height(f, denom)).collect())
    }

    /// Shock parameters for one Newkirk fold
    pub fn shock_summary(&self, fold: u8) -> SpectroResult<ShockSummary> {
        let denom = newkirk_denominator(fold)?;
        let speeds = self.shock_speeds(fold)?;
        let heights = self.shock_heights(fold)?;

        let mut start_freq = nan_percentile(&self.freqs, START_PERCENTILE)
            .ok_or_else(|| SpectroError::InvalidParameter("trace has no finite frequencies".to_string()))?;
        if self.harmonic {
            start_freq /= 2.0;
        }

        let idx = self
            .freqs
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(best, best_dist), (i, &f)| {
                let dist = (f - start_freq).abs();
                if dist < best_dist {
                    (i, dist)
                } else {
                    (best, best_dist)
                }
            })
            .0;

        let f0 = self.freqs[idx];
        let g0 = (f0 * f0 / denom).ln();
        let initial_shock_speed_err = SPEED_COEFF * self.drift_err[idx] / (f0 * g0 * g0);
        let height_slope = 2.0 * HEIGHT_COEFF * LN_10 / (f0 * g0 * g0);
        let initial_shock_height_err = (height_slope * self.freq_err).abs();

        let (avg_freq, avg_freq_err) = mean_and_sem(&self.freqs);
        let (avg_drift, avg_drift_err) = mean_and_sem(&self.drift);
        let (avg_shock_speed, avg_shock_speed_err) = mean_and_sem(&speeds);
        let (avg_shock_height, avg_shock_height_err) = mean_and_sem(&heights);

        log::debug!(
            "Newkirk {}-fold: start {:.2} MHz at sample {}, speed {:.1} km/s, height {:.3} Rs",
            fold,
            start_freq,
            idx,
            speeds[idx],
            heights[idx]
        );

        Ok(ShockSummary {
            avg_freq,
            avg_freq_err,
            avg_drift,
            avg_drift_err,
            start_freq,
            start_freq_err: self.freq_err,
            initial_shock_speed: speeds[idx],
            initial_shock_speed_err,
            initial_shock_height: heights[idx],
            initial_shock_height_err,
            avg_shock_speed,
            avg_shock_speed_err,
            avg_shock_height,
            avg_shock_height_err,
            fold,
            fundamental: self.fundamental,
            harmonic: self.harmonic,
        })
    }
}

/// Fit a trace given as separate arrays with default parameters
pub fn fit_burst(time_channels: &Array1<usize>, freqs: &Array1<f64>, harmonic: bool) -> SpectroResult<FitResult> {
    BurstKinematicsFitter::new().fit_burst(time_channels, freqs, harmonic)
}

/// Shock parameters for a fit and its trace with default parameters.
///
/// Trace samples are converted to seconds with the default sampling interval;
/// a fit made with another `seconds_per_sample` needs [`shock_summary_with_params`].
pub fn shock_summary(fit: &FitResult, trace: &MaxIntensityTrace, fold: u8) -> SpectroResult<ShockSummary> {
    shock_summary_with_params(fit, trace, fold, &KinematicsParams::default())
}

pub fn shock_summary_with_params(
    fit: &FitResult,
    trace: &MaxIntensityTrace,
    fold: u8,
    params: &KinematicsParams,
) -> SpectroResult<ShockSummary> {
    DriftProfile::from_fit(fit, trace, params)?.shock_summary(fold)
}

fn newkirk_denominator(fold: u8) -> SpectroResult<f64> {
    if !(1..=4).contains(&fold) {
        return Err(SpectroError::InvalidParameter(format!(
            "Newkirk fold must be 1-4, got {}",
            fold
        )));
    }
    Ok(f64::from(fold) * NEWKIRK_BASE)
}

fn shock_speed(freq: f64, drift: f64, denom: f64) -> f64 {
    let l = (freq * freq / denom).ln();
    SPEED_COEFF * drift.abs() / (freq * l * l)
}

fn shock_height(freq: f64, denom: f64) -> f64 {
    HEIGHT_COEFF * LN_10 / (freq * freq / denom).ln()
}

fn mean_and_sem(values: &[f64]) -> (f64, f64) {
    let mean = nan_mean(values).unwrap_or(f64::NAN);
    let std = nan_std(values).unwrap_or(f64::NAN);
    (mean, std / (values.len() as f64).sqrt())
}

/// Seconds and frequencies of samples where the power law is defined
fn usable_samples(
    time_channels: &Array1<usize>,
    freqs: &Array1<f64>,
    seconds_per_sample: f64,
) -> SpectroResult<(Vec<f64>, Vec<f64>)> {
    if time_channels.len() != freqs.len() {
        return Err(SpectroError::InvalidParameter(format!(
            "{} time channels but {} frequencies",
            time_channels.len(),
            freqs.len()
        )));
    }

    let (t, f): (Vec<f64>, Vec<f64>) = time_channels
        .iter()
        .zip(freqs.iter())
        .map(|(&ch, &freq)| (ch as f64 * seconds_per_sample, freq))
        .filter(|&(t, freq)| t > 0.0 && t.is_finite() && freq.is_finite() && freq > 0.0)
        .unzip();

    let dropped = freqs.len() - t.len();
    if dropped > 0 {
        log::warn!("Excluded {} trace sample(s) with t <= 0 or invalid frequency", dropped);
    }
    Ok((t, f))
}

/// Straight line through `ln f = ln a + b ln t`
fn initial_guess(t: &[f64], f: &[f64]) -> (f64, f64) {
    let n = t.len() as f64;
    let x: Vec<f64> = t.iter().map(|v| v.ln()).collect();
    let y: Vec<f64> = f.iter().map(|v| v.ln()).collect();
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let sxy: f64 = x.iter().zip(&y).map(|(xi, yi)| (xi - mean_x) * (yi - mean_y)).sum();

    if sxx > 0.0 {
        let b = sxy / sxx;
        ((mean_y - b * mean_x).exp(), b)
    } else {
        (f.iter().sum::<f64>() / n, 0.0)
    }
}

fn sum_squares(t: &[f64], f: &[f64], a: f64, b: f64) -> f64 {
    t.iter().zip(f).map(|(&ti, &fi)| (fi - a * ti.powf(b)).powi(2)).sum()
}

/// `(JᵀJ, Jᵀr)` with `∂/∂a = t^b`, `∂/∂b = a t^b ln t`
fn normal_equations(t: &[f64], f: &[f64], a: f64, b: f64) -> ([[f64; 2]; 2], [f64; 2]) {
    let mut jtj = [[0.0; 2]; 2];
    let mut jtr = [0.0; 2];
    for (&ti, &fi) in t.iter().zip(f) {
        let tb = ti.powf(b);
        let j = [tb, a * tb * ti.ln()];
        let r = fi - a * tb;
        for row in 0..2 {
            jtr[row] += j[row] * r;
            for col in 0..2 {
                jtj[row][col] += j[row] * j[col];
            }
        }
    }
    (jtj, jtr)
}

fn invert_2x2(m: &[[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    Some([
        [m[1][1] / det, -m[0][1] / det],
        [-m[1][0] / det, m[0][0] / det],
    ])
}

/// `(R², RMSE)`; a constant target gives R² = 1 for a perfect fit and 0 otherwise
fn goodness_of_fit(t: &[f64], f: &[f64], a: f64, b: f64) -> (f64, f64) {
    let n = f.len() as f64;
    let mean = f.iter().sum::<f64>() / n;
    let ss_res = sum_squares(t, f, a, b);
    let ss_tot: f64 = f.iter().map(|fi| (fi - mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };
    (r2, (ss_res / n).sqrt())
}
