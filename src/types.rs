use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Intensity sample type (receiver digits or dB-like units)
pub type Intensity = f32;

/// 2D intensity matrix (frequency x time)
pub type IntensityImage = Array2<Intensity>;

/// 1D physical axis (MHz for frequency, seconds for time)
pub type Axis = Array1<f64>;

/// Typed value of a header card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Text(s) => s.trim().parse().ok(),
            HeaderValue::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Int(v) => write!(f, "{}", v),
            HeaderValue::Float(v) => write!(f, "{}", v),
            HeaderValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Bool(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<usize> for HeaderValue {
    fn from(v: usize) -> Self {
        HeaderValue::Int(v as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Text(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Text(v)
    }
}

/// One header card. Commentary cards (HISTORY, COMMENT) have no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCard {
    pub keyword: String,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

/// Ordered key/value metadata copied from the source file.
///
/// Keywords are stored upper-case and looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    cards: Vec<HeaderCard>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: Vec<HeaderCard>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        let key = keyword.to_ascii_uppercase();
        self.cards
            .iter()
            .find(|c| c.keyword == key && c.value.is_some())
            .and_then(|c| c.value.as_ref())
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(HeaderValue::as_bool)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Replace the first card with this keyword, or append a new one.
    pub fn set<V: Into<HeaderValue>>(&mut self, keyword: &str, value: V, comment: Option<&str>) {
        let key = keyword.to_ascii_uppercase();
        let card = HeaderCard {
            keyword: key.clone(),
            value: Some(value.into()),
            comment: comment.map(str::to_string),
        };
        match self.cards.iter_mut().find(|c| c.keyword == key) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    pub fn remove(&mut self, keyword: &str) {
        let key = keyword.to_ascii_uppercase();
        self.cards.retain(|c| c.keyword != key);
    }

    pub fn add_history(&mut self, text: &str) {
        self.cards.push(HeaderCard {
            keyword: "HISTORY".to_string(),
            value: None,
            comment: Some(text.to_string()),
        });
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.cards
            .iter()
            .filter(|c| c.keyword == "HISTORY")
            .filter_map(|c| c.comment.as_deref())
    }
}

/// Where an axis came from when the file was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisSource {
    /// Named column of an auxiliary binary table
    Table,
    /// Linear WCS keywords (CRVALn, CDELTn, CRPIXn)
    HeaderWcs,
    /// Synthesized 0..n index array
    Index,
}

/// How the stored matrix was oriented relative to the resolved axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Stored as (frequency, time)
    AsStored,
    /// Stored as (time, frequency) and transposed on load
    Transposed,
    /// Both axis candidates matched the same dimension; axes were replaced by indices
    Ambiguous,
}

/// Provenance of the axes attached to a loaded spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisInfo {
    pub freq_source: AxisSource,
    pub time_source: AxisSource,
    pub orientation: Orientation,
}

impl AxisInfo {
    /// True when both axes come from file metadata and orientation was not guessed
    pub fn is_authoritative(&self) -> bool {
        self.freq_source != AxisSource::Index
            && self.time_source != AxisSource::Index
            && self.orientation != Orientation::Ambiguous
    }
}

impl Default for AxisInfo {
    fn default() -> Self {
        Self {
            freq_source: AxisSource::Table,
            time_source: AxisSource::Table,
            orientation: Orientation::AsStored,
        }
    }
}

/// Normalized dynamic spectrum: rows are frequency channels, columns are time samples.
///
/// `data.dim() == (freqs.len(), time.len())` holds for every value produced by this crate.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub data: IntensityImage,
    pub freqs: Axis,
    pub time: Axis,
    pub header: Header,
    pub axes: AxisInfo,
}

impl Spectrogram {
    /// Build a spectrogram from parts, rejecting mismatched axis lengths.
    pub fn new(data: IntensityImage, freqs: Axis, time: Axis, header: Header) -> SpectroResult<Self> {
        if data.dim() != (freqs.len(), time.len()) {
            return Err(SpectroError::InvalidParameter(format!(
                "data shape {:?} does not match axes ({}, {})",
                data.dim(),
                freqs.len(),
                time.len()
            )));
        }
        Ok(Self {
            data,
            freqs,
            time,
            header,
            axes: AxisInfo::default(),
        })
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Observation start in seconds of day, from `TIME-OBS` (`HH:MM:SS[.fff]`)
    pub fn ut_start_seconds(&self) -> Option<f64> {
        self.header.get_str("TIME-OBS").and_then(parse_clock_seconds)
    }
}

/// Parse `HH:MM:SS[.fff]` into seconds of day
pub fn parse_clock_seconds(text: &str) -> Option<f64> {
    let mut parts = text.trim().split(':');
    let hh: u32 = parts.next()?.trim().parse().ok()?;
    let mm: u32 = parts.next()?.trim().parse().ok()?;
    let ss: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hh as f64 * 3600.0 + mm as f64 * 60.0 + ss)
}

/// Merge axis used by the combiner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    Frequency,
    Time,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::Frequency => write!(f, "frequency"),
            CombineMode::Time => write!(f, "time"),
        }
    }
}

/// Result of merging several recordings
#[derive(Debug, Clone)]
pub struct CombinedSpectrogram {
    pub spectrogram: Spectrogram,
    /// Source paths in merge order
    pub sources: Vec<PathBuf>,
    pub combine_mode: CombineMode,
    pub filename: String,
    /// Start of the first source in seconds of day, when its header carries `TIME-OBS`
    pub ut_start_sec: Option<f64>,
}

/// Cleaned matrix plus the channels that were repaired
#[derive(Debug, Clone)]
pub struct RfiResult {
    pub data: IntensityImage,
    /// Sorted row indices flagged as interference-dominated
    pub masked_channel_indices: Vec<usize>,
}

/// Per-time-sample peak frequency of a burst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxIntensityTrace {
    /// Raw sample index, not seconds
    pub time_channels: Array1<usize>,
    /// Peak frequency (MHz) for each sample
    pub freqs: Array1<f64>,
    pub fundamental: bool,
    pub harmonic: bool,
}

impl MaxIntensityTrace {
    pub fn new(time_channels: Array1<usize>, freqs: Array1<f64>, harmonic: bool) -> SpectroResult<Self> {
        if time_channels.len() != freqs.len() {
            return Err(SpectroError::InvalidParameter(format!(
                "trace has {} time channels but {} frequencies",
                time_channels.len(),
                freqs.len()
            )));
        }
        Ok(Self {
            time_channels,
            freqs,
            fundamental: !harmonic,
            harmonic,
        })
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Same trace, interpreted as the given emission mode
    pub fn with_harmonic(mut self, harmonic: bool) -> Self {
        self.harmonic = harmonic;
        self.fundamental = !harmonic;
        self
    }
}

/// Power-law fit `f(t) = a * t^b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub a: f64,
    pub b: f64,
    /// Standard errors of `a` and `b`
    pub std_errs: [f64; 2],
    pub r2: f64,
    pub rmse: f64,
}

impl FitResult {
    pub fn evaluate(&self, t: f64) -> f64 {
        self.a * t.powf(self.b)
    }

    /// Drift rate `df/dt = a * b * t^(b - 1)` in MHz/s
    pub fn drift_rate(&self, t: f64) -> f64 {
        self.a * self.b * t.powf(self.b - 1.0)
    }

    pub fn equation(&self) -> String {
        format!("f(t) = {:.2} · t^{:.2}", self.a, self.b)
    }
}

/// Shock kinematics derived from a fit for one Newkirk fold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockSummary {
    pub avg_freq: f64,
    pub avg_freq_err: f64,
    pub avg_drift: f64,
    pub avg_drift_err: f64,
    pub start_freq: f64,
    pub start_freq_err: f64,
    /// km/s
    pub initial_shock_speed: f64,
    pub initial_shock_speed_err: f64,
    /// Solar radii
    pub initial_shock_height: f64,
    pub initial_shock_height_err: f64,
    pub avg_shock_speed: f64,
    pub avg_shock_speed_err: f64,
    pub avg_shock_height: f64,
    pub avg_shock_height_err: f64,
    pub fold: u8,
    pub fundamental: bool,
    pub harmonic: bool,
}

/// Error types for spectrogram processing
#[derive(Debug, thiserror::Error)]
pub enum SpectroError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Cannot combine files: {0}")]
    Combine(String),

    #[error("Burst fit failed: {0}")]
    Fit(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for spectrogram operations
pub type SpectroResult<T> = Result<T, SpectroError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_header_set_replaces_and_lookup_is_case_insensitive() {
        let mut header = Header::new();
        header.set("time-obs", "12:00:00.000", None);
        header.set("TIME-OBS", "12:15:00.000", Some("start"));
        header.add_history("first");

        assert_eq!(header.len(), 2);
        assert_eq!(header.get_str("Time-Obs"), Some("12:15:00.000"));
        assert_eq!(header.history().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn test_clock_parsing() {
        assert_eq!(parse_clock_seconds("01:02:03"), Some(3723.0));
        assert_eq!(parse_clock_seconds("12:00:00.500"), Some(43200.5));
        assert_eq!(parse_clock_seconds("12-00-00"), None);
        assert_eq!(parse_clock_seconds("1:2:3:4"), None);
    }

    #[test]
    fn test_spectrogram_rejects_mismatched_axes() {
        let data = Array2::<f32>::zeros((2, 3));
        let result = Spectrogram::new(data, array![1.0, 2.0, 3.0], array![0.0, 1.0], Header::new());
        assert!(matches!(result, Err(SpectroError::InvalidParameter(_))));
    }

    #[test]
    fn test_fit_result_equation_and_drift() {
        let fit = FitResult { a: 50.0, b: -0.4, std_errs: [0.0, 0.0], r2: 1.0, rmse: 0.0 };
        assert_eq!(fit.equation(), "f(t) = 50.00 · t^-0.40");
        assert!((fit.evaluate(1.0) - 50.0).abs() < 1e-12);
        assert!((fit.drift_rate(1.0) + 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_combine_mode_display() {
        assert_eq!(CombineMode::Frequency.to_string(), "frequency");
        assert_eq!(CombineMode::Time.to_string(), "time");
    }
}
