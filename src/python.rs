//! Python bindings for the analysis core

use crate::core::{self as analysis, BurstKinematicsFitter, KinematicsParams};
use crate::io;
use crate::types::{CombinedSpectrogram, FitResult, MaxIntensityTrace, SpectroError};
use ndarray::Array1;
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<SpectroError> for PyErr {
    fn from(err: SpectroError) -> PyErr {
        match err {
            SpectroError::Io(_) => PyIOError::new_err(err.to_string()),
            SpectroError::Fit(_) => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

type SpectrogramTuple<'py> = (&'py PyArray2<f32>, &'py PyArray1<f64>, &'py PyArray1<f64>);

#[pymodule]
fn callisto(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(load, m)?)?;
    m.add_function(wrap_pyfunction!(are_frequency_combinable, m)?)?;
    m.add_function(wrap_pyfunction!(are_time_combinable, m)?)?;
    m.add_function(wrap_pyfunction!(combine_frequency, m)?)?;
    m.add_function(wrap_pyfunction!(combine_time, m)?)?;
    m.add_function(wrap_pyfunction!(clean_rfi, m)?)?;
    m.add_function(wrap_pyfunction!(extract_max_intensity_trace, m)?)?;
    m.add_function(wrap_pyfunction!(fit_burst, m)?)?;
    m.add_function(wrap_pyfunction!(shock_summary, m)?)?;
    m.add_class::<PyFitResult>()?;
    Ok(())
}

/// Load a file as `(data, freqs, time)`
#[pyfunction]
fn load(py: Python<'_>, path: String) -> PyResult<SpectrogramTuple<'_>> {
    let spec = io::load(&path)?;
    Ok((
        spec.data.into_pyarray(py),
        spec.freqs.into_pyarray(py),
        spec.time.into_pyarray(py),
    ))
}

#[pyfunction]
fn are_frequency_combinable(paths: Vec<String>) -> bool {
    analysis::are_frequency_combinable(&paths)
}

#[pyfunction]
fn are_time_combinable(paths: Vec<String>) -> bool {
    analysis::are_time_combinable(&paths)
}

fn combined_dict(py: Python<'_>, combined: CombinedSpectrogram) -> PyResult<&PyDict> {
    let dict = PyDict::new(py);
    dict.set_item("filename", &combined.filename)?;
    dict.set_item("combine_mode", combined.combine_mode.to_string())?;
    dict.set_item("ut_start_sec", combined.ut_start_sec)?;
    let sources: Vec<String> = combined.sources.iter().map(|p| p.display().to_string()).collect();
    dict.set_item("sources", sources)?;
    let spec = combined.spectrogram;
    dict.set_item("data", spec.data.into_pyarray(py))?;
    dict.set_item("freqs", spec.freqs.into_pyarray(py))?;
    dict.set_item("time", spec.time.into_pyarray(py))?;
    Ok(dict)
}

#[pyfunction]
fn combine_frequency(py: Python<'_>, paths: Vec<String>) -> PyResult<&PyDict> {
    combined_dict(py, analysis::combine_frequency(&paths)?)
}

#[pyfunction]
fn combine_time(py: Python<'_>, paths: Vec<String>) -> PyResult<&PyDict> {
    combined_dict(py, analysis::combine_time(&paths)?)
}

/// Returns `(cleaned, masked_channel_indices)`
#[pyfunction]
#[pyo3(signature = (data, kernel_time=3, kernel_freq=3, channel_z_threshold=6.0, percentile_clip=99.5, enabled=true))]
fn clean_rfi<'py>(
    py: Python<'py>,
    data: PyReadonlyArray2<f32>,
    kernel_time: usize,
    kernel_freq: usize,
    channel_z_threshold: f64,
    percentile_clip: f64,
    enabled: bool,
) -> PyResult<(&'py PyArray2<f32>, Vec<usize>)> {
    let input = data.as_array().to_owned();
    let result = analysis::clean_rfi(
        &input,
        kernel_time,
        kernel_freq,
        channel_z_threshold,
        percentile_clip,
        enabled,
    )?;
    Ok((result.data.into_pyarray(py), result.masked_channel_indices))
}

/// Returns `(time_channels, freqs)`
#[pyfunction]
fn extract_max_intensity_trace<'py>(
    py: Python<'py>,
    data: PyReadonlyArray2<f32>,
    freqs: PyReadonlyArray1<f64>,
) -> PyResult<(Vec<usize>, &'py PyArray1<f64>)> {
    let trace = analysis::extract_max_intensity_trace(&data.as_array().to_owned(), &freqs.as_array().to_owned())?;
    Ok((trace.time_channels.to_vec(), trace.freqs.into_pyarray(py)))
}

fn kinematics_params(seconds_per_sample: f64) -> KinematicsParams {
    KinematicsParams {
        seconds_per_sample,
        ..KinematicsParams::default()
    }
}

#[pyfunction]
#[pyo3(signature = (time_channels, freqs, harmonic=false, seconds_per_sample=0.25))]
fn fit_burst(
    time_channels: Vec<usize>,
    freqs: Vec<f64>,
    harmonic: bool,
    seconds_per_sample: f64,
) -> PyResult<PyFitResult> {
    let fitter = BurstKinematicsFitter::with_params(kinematics_params(seconds_per_sample));
    let fit = fitter.fit_burst(&Array1::from(time_channels), &Array1::from(freqs), harmonic)?;
    Ok(PyFitResult { inner: fit })
}

#[pyfunction]
#[pyo3(signature = (fit, time_channels, freqs, harmonic=false, fold=1, seconds_per_sample=0.25))]
fn shock_summary<'py>(
    py: Python<'py>,
    fit: PyRef<'_, PyFitResult>,
    time_channels: Vec<usize>,
    freqs: Vec<f64>,
    harmonic: bool,
    fold: u8,
    seconds_per_sample: f64,
) -> PyResult<&'py PyDict> {
    let trace = MaxIntensityTrace::new(Array1::from(time_channels), Array1::from(freqs), harmonic)?;
    let summary =
        analysis::shock_summary_with_params(&fit.inner, &trace, fold, &kinematics_params(seconds_per_sample))?;

    let dict = PyDict::new(py);
    dict.set_item("avg_freq", summary.avg_freq)?;
    dict.set_item("avg_freq_err", summary.avg_freq_err)?;
    dict.set_item("avg_drift", summary.avg_drift)?;
    dict.set_item("avg_drift_err", summary.avg_drift_err)?;
    dict.set_item("start_freq", summary.start_freq)?;
    dict.set_item("start_freq_err", summary.start_freq_err)?;
    dict.set_item("initial_shock_speed", summary.initial_shock_speed)?;
    dict.set_item("initial_shock_speed_err", summary.initial_shock_speed_err)?;
    dict.set_item("initial_shock_height", summary.initial_shock_height)?;
    dict.set_item("initial_shock_height_err", summary.initial_shock_height_err)?;
    dict.set_item("avg_shock_speed", summary.avg_shock_speed)?;
    dict.set_item("avg_shock_speed_err", summary.avg_shock_speed_err)?;
    dict.set_item("avg_shock_height", summary.avg_shock_height)?;
    dict.set_item("avg_shock_height_err", summary.avg_shock_height_err)?;
    dict.set_item("fold", summary.fold)?;
    dict.set_item("fundamental", summary.fundamental)?;
    dict.set_item("harmonic", summary.harmonic)?;
    Ok(dict)
}

/// Python wrapper for FitResult
#[pyclass(name = "FitResult")]
#[derive(Clone)]
struct PyFitResult {
    inner: FitResult,
}

#[pymethods]
impl PyFitResult {
    #[getter]
    fn a(&self) -> f64 {
        self.inner.a
    }

    #[getter]
    fn b(&self) -> f64 {
        self.inner.b
    }

    #[getter]
    fn std_errs(&self) -> (f64, f64) {
        (self.inner.std_errs[0], self.inner.std_errs[1])
    }

    #[getter]
    fn r2(&self) -> f64 {
        self.inner.r2
    }

    #[getter]
    fn rmse(&self) -> f64 {
        self.inner.rmse
    }

    fn drift_rate(&self, t: f64) -> f64 {
        self.inner.drift_rate(t)
    }

    fn __str__(&self) -> String {
        self.inner.equation()
    }

    fn __repr__(&self) -> String {
        format!(
            "FitResult(a={:.4}, b={:.4}, r2={:.4}, rmse={:.4})",
            self.inner.a, self.inner.b, self.inner.r2, self.inner.rmse
        )
    }
}
