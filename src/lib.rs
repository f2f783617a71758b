//! callisto: e-CALLISTO Solar Radio Spectrogram Analysis
//!
//! This library loads dynamic spectra recorded by the e-CALLISTO network,
//! merges adjacent frequency bands or consecutive time segments, removes
//! radio-frequency interference and derives type II burst shock kinematics
//! from the drifting emission ridge.
//!
//! ```no_run
//! use callisto::{clean_rfi, extract_max_intensity_trace, fit_burst, load, shock_summary};
//!
//! let spec = load("BIR_20240101_120000_01.fit.gz")?;
//! let cleaned = clean_rfi(&spec.data, 3, 3, 6.0, 99.5, true)?;
//! let trace = extract_max_intensity_trace(&cleaned.data, &spec.freqs)?;
//! let fit = fit_burst(&trace.time_channels, &trace.freqs, trace.harmonic)?;
//! let summary = shock_summary(&fit, &trace, 1)?;
//! println!("{} -> {:.0} km/s", fit.equation(), summary.initial_shock_speed);
//! # Ok::<(), callisto::SpectroError>(())
//! ```

pub mod config;
pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use crate::types::{
    AxisInfo, AxisSource, CombineMode, CombinedSpectrogram, FitResult, Header, HeaderValue,
    MaxIntensityTrace, Orientation, RfiResult, ShockSummary, Spectrogram, SpectroError,
    SpectroResult,
};

pub use crate::config::AnalysisConfig;
pub use crate::core::{
    are_frequency_combinable, are_time_combinable, classify, clean_rfi, combine_frequency,
    combine_time, extract_max_intensity_trace, fit_burst, reduce_noise, shock_summary,
    subtract_mean_background, BurstKinematicsFitter, CombinabilityClassifier, DriftProfile,
    RfiCleaner, SpectrogramCombiner,
};
pub use crate::io::{load, FileIdentity, SpectrogramLoader};
