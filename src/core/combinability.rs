use crate::io::{FileIdentity, SpectrogramLoader};
use crate::types::{Axis, CombineMode, SpectroError, SpectroResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Relative tolerance applied on top of the absolute axis tolerance
const AXIS_RTOL: f64 = 1e-5;

/// Merge compatibility parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineParams {
    /// Absolute tolerance for comparing frequency or time axes
    pub axis_tolerance: f64,
    /// Shortest accepted start-time gap between consecutive files (seconds, inclusive)
    pub min_gap_seconds: f64,
    /// Longest accepted start-time gap between consecutive files (seconds, inclusive)
    pub max_gap_seconds: f64,
}

impl Default for CombineParams {
    fn default() -> Self {
        Self {
            axis_tolerance: 0.01,
            min_gap_seconds: 750.0,
            max_gap_seconds: 1050.0,
        }
    }
}

/// Elementwise `|a - b| <= tol + rtol * |b|`; axes of different length never match
pub(crate) fn axes_match(a: &Axis, b: &Axis, tolerance: f64) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= tolerance + AXIS_RTOL * y.abs())
}

/// Pair every path with its parsed identity
pub(crate) fn identify<P: AsRef<Path>>(paths: &[P]) -> SpectroResult<Vec<(PathBuf, FileIdentity)>> {
    paths
        .iter()
        .map(|p| Ok((p.as_ref().to_path_buf(), FileIdentity::parse(p)?)))
        .collect()
}

/// Paths ordered by their time-of-day token; ties keep input order
pub(crate) fn sort_by_time_of_day(mut files: Vec<(PathBuf, FileIdentity)>) -> Vec<(PathBuf, FileIdentity)> {
    files.sort_by(|a, b| a.1.time_of_day.cmp(&b.1.time_of_day));
    files
}

/// Yes/no probes deciding whether a set of files can be merged.
///
/// Probes never fail: unreadable files and malformed names make them return `false`.
pub struct CombinabilityClassifier {
    params: CombineParams,
    loader: SpectrogramLoader,
}

impl CombinabilityClassifier {
    pub fn new() -> Self {
        Self::with_params(CombineParams::default())
    }

    pub fn with_params(params: CombineParams) -> Self {
        Self::with_loader(params, SpectrogramLoader::new())
    }

    /// Read input files through a configured loader
    pub fn with_loader(params: CombineParams, loader: SpectrogramLoader) -> Self {
        Self { params, loader }
    }

    pub fn params(&self) -> &CombineParams {
        &self.params
    }

    /// Adjacent frequency bands of one observation
    pub fn are_frequency_combinable<P: AsRef<Path>>(&self, paths: &[P]) -> bool {
        match self.check_frequency(paths) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Not frequency-combinable: {}", e);
                false
            }
        }
    }

    /// Consecutive time segments of one receiver
    pub fn are_time_combinable<P: AsRef<Path>>(&self, paths: &[P]) -> bool {
        match self.check_time(paths) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Not time-combinable: {}", e);
                false
            }
        }
    }

    /// Frequency merge is tried first, then time
    pub fn classify<P: AsRef<Path>>(&self, paths: &[P]) -> Option<CombineMode> {
        if self.are_frequency_combinable(paths) {
            Some(CombineMode::Frequency)
        } else if self.are_time_combinable(paths) {
            Some(CombineMode::Time)
        } else {
            None
        }
    }

    fn check_frequency<P: AsRef<Path>>(&self, paths: &[P]) -> SpectroResult<()> {
        if paths.len() < 2 {
            return Err(SpectroError::Combine("need at least 2 files".to_string()));
        }
        let files = identify(paths)?;
        let reference = &files[0].1;

        let mut receivers = HashSet::new();
        let mut time_ref: Option<Axis> = None;

        for (path, id) in &files {
            if id.station != reference.station || id.date != reference.date || id.time_of_day != reference.time_of_day {
                return Err(SpectroError::Combine(format!(
                    "{} is not from observation {}_{}_{}",
                    path.display(),
                    reference.station,
                    reference.date,
                    reference.time_of_day
                )));
            }
            if !receivers.insert(id.receiver_id.as_str()) {
                return Err(SpectroError::Combine(format!("duplicate receiver id {}", id.receiver_id)));
            }

            let time = self.loader.load(path)?.time;
            match &time_ref {
                None => time_ref = Some(time),
                Some(reference_time) if !axes_match(&time, reference_time, self.params.axis_tolerance) => {
                    return Err(SpectroError::Combine(format!("time axis of {} differs", path.display())));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_time<P: AsRef<Path>>(&self, paths: &[P]) -> SpectroResult<()> {
        if paths.len() < 2 {
            return Err(SpectroError::Combine("need at least 2 files".to_string()));
        }
        let files = sort_by_time_of_day(identify(paths)?);
        let (first_path, reference) = &files[0];

        let freqs_ref = self.loader.load(first_path)?.freqs;
        let mut previous = reference.seconds_of_day()?;

        for (path, id) in &files[1..] {
            if id.station != reference.station || id.date != reference.date {
                return Err(SpectroError::Combine(format!(
                    "{} is from a different station or date",
                    path.display()
                )));
            }
            if id.receiver_id != reference.receiver_id {
                return Err(SpectroError::Combine(format!(
                    "focus code {} differs from {}",
                    id.receiver_id, reference.receiver_id
                )));
            }

            let freqs = self.loader.load(path)?.freqs;
            if !axes_match(&freqs, &freqs_ref, self.params.axis_tolerance) {
                return Err(SpectroError::Combine(format!("frequency axis of {} differs", path.display())));
            }

            let current = id.seconds_of_day()?;
            let gap = (f64::from(current) - f64::from(previous)).abs();
            if gap < self.params.min_gap_seconds || gap > self.params.max_gap_seconds {
                return Err(SpectroError::Combine(format!(
                    "gap of {} s before {} is outside [{}, {}]",
                    gap,
                    path.display(),
                    self.params.min_gap_seconds,
                    self.params.max_gap_seconds
                )));
            }
            previous = current;
        }
        Ok(())
    }
}

impl Default for CombinabilityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

pub fn are_frequency_combinable<P: AsRef<Path>>(paths: &[P]) -> bool {
    CombinabilityClassifier::new().are_frequency_combinable(paths)
}

pub fn are_time_combinable<P: AsRef<Path>>(paths: &[P]) -> bool {
    CombinabilityClassifier::new().are_time_combinable(paths)
}

pub fn classify<P: AsRef<Path>>(paths: &[P]) -> Option<CombineMode> {
    CombinabilityClassifier::new().classify(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::{BinTable, FitsFile, Hdu, HduData, TableColumn};
    use crate::io::{write_spectrogram, LoaderParams};
    use crate::types::{Header, Spectrogram};
    use ndarray::{Array1, Array2};
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, freqs: Vec<f64>, time: Vec<f64>) -> PathBuf {
        let data = Array2::<f32>::ones((freqs.len(), time.len()));
        let spec = Spectrogram::new(data, Array1::from(freqs), Array1::from(time), Header::new()).unwrap();
        let path = dir.join(name);
        write_spectrogram(&spec, &path).unwrap();
        path
    }

    fn ramp(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn test_axes_match_tolerance() {
        let a = Array1::from(vec![0.0, 0.25, 0.5]);
        let b = Array1::from(vec![0.005, 0.255, 0.5]);
        assert!(axes_match(&a, &b, 0.01));
        assert!(!axes_match(&a, &b, 0.001));
        assert!(!axes_match(&a, &Array1::from(vec![0.0, 0.25]), 0.01));
    }

    #[test]
    fn test_frequency_combinable_pair() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "BIR_20240101_120000_00.fit", vec![80.0, 70.0], ramp(6, 0.25));
        let b = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![60.0, 50.0], ramp(6, 0.25));

        let classifier = CombinabilityClassifier::new();
        assert!(classifier.are_frequency_combinable(&[&a, &b]));
        assert!(!classifier.are_frequency_combinable(&[&a, &a]));
        assert!(!classifier.are_frequency_combinable(&[&a]));
        assert_eq!(classifier.classify(&[&a, &b]), Some(CombineMode::Frequency));
    }

    #[test]
    fn test_frequency_rejects_shifted_time_axis() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "BIR_20240101_120000_00.fit", vec![80.0], ramp(4, 0.25));
        let b = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![60.0], ramp(4, 0.5));
        assert!(!are_frequency_combinable(&[a, b]));
    }

    #[test]
    fn test_time_combinable_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let freqs = vec![80.0, 70.0, 60.0];
        let late = write_file(dir.path(), "BIR_20240101_121500_01.fit", freqs.clone(), ramp(4, 0.25));
        let early = write_file(dir.path(), "BIR_20240101_120000_01.fit", freqs.clone(), ramp(4, 0.25));

        assert!(are_time_combinable(&[&late, &early]));
        assert_eq!(classify(&[&late, &early]), Some(CombineMode::Time));

        let gap_too_long = write_file(dir.path(), "BIR_20240101_124500_01.fit", freqs, ramp(4, 0.25));
        assert!(!are_time_combinable(&[&early, &gap_too_long]));
    }

    #[test]
    fn test_time_rejects_other_focus_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![80.0], ramp(4, 0.25));
        let b = write_file(dir.path(), "BIR_20240101_121500_02.fit", vec![80.0], ramp(4, 0.25));
        assert!(!are_time_combinable(&[&a, &b]));

        let missing = dir.path().join("BIR_20240101_121500_01.fit");
        assert!(!are_time_combinable(&[a, missing]));
        assert!(!are_time_combinable(&["bad_name.fit", "other.fit"]));
    }

    /// Axis table using column names outside the default variants
    fn write_custom_columns(dir: &Path, name: &str, freqs: Vec<f64>, time: Vec<f64>) -> PathBuf {
        let image = Array2::<f64>::zeros((freqs.len(), time.len())).into_dyn();
        let fits = FitsFile {
            hdus: vec![
                Hdu { header: Header::new(), data: HduData::Image(image) },
                Hdu {
                    header: Header::new(),
                    data: HduData::Table(BinTable {
                        columns: vec![
                            TableColumn { name: "CHANNEL_MHZ".to_string(), rows: vec![freqs] },
                            TableColumn { name: "ELAPSED".to_string(), rows: vec![time] },
                        ],
                    }),
                },
            ],
        };
        let path = dir.join(name);
        fits.write(&path).unwrap();
        path
    }

    #[test]
    fn test_configured_loader_reads_custom_axis_columns() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_custom_columns(dir.path(), "BIR_20240101_120000_00.fit", vec![80.0, 70.0], ramp(4, 0.25));
        let b = write_custom_columns(dir.path(), "BIR_20240101_120000_01.fit", vec![60.0, 50.0], ramp(4, 0.5));

        // default names miss both columns, so both files get identical index axes
        assert!(CombinabilityClassifier::new().are_frequency_combinable(&[&a, &b]));

        let loader = SpectrogramLoader::with_params(LoaderParams {
            frequency_columns: vec!["channel_mhz".to_string()],
            time_columns: vec!["elapsed".to_string()],
        });
        let classifier = CombinabilityClassifier::with_loader(CombineParams::default(), loader);
        assert!(!classifier.are_frequency_combinable(&[&a, &b]));
        assert_eq!(classifier.classify(&[&a, &b]), None);
    }
}
