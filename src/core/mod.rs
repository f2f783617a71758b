//! Core spectrogram processing modules

pub mod background;
pub mod burst;
pub mod combinability;
pub mod combine;
pub mod kinematics;
pub mod rfi;
pub mod stats;

// Re-export main types
pub use background::{reduce_noise, subtract_mean_background, NoiseParams};
pub use burst::extract_max_intensity_trace;
pub use combinability::{
    are_frequency_combinable, are_time_combinable, classify, CombinabilityClassifier, CombineParams,
};
pub use combine::{build_combined_header, combine_frequency, combine_time, SpectrogramCombiner};
pub use kinematics::{
    fit_burst, shock_summary, shock_summary_with_params, BurstKinematicsFitter, DriftProfile,
    KinematicsParams,
};
pub use rfi::{clean_rfi, RfiCleaner, RfiParams, RfiReport};
