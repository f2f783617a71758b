use crate::core::combinability::{axes_match, identify, sort_by_time_of_day, CombineParams};
use crate::io::{FileIdentity, SpectrogramLoader};
use crate::types::{
    Axis, CombineMode, CombinedSpectrogram, Header, IntensityImage, Spectrogram, SpectroError,
    SpectroResult,
};
use ndarray::{concatenate, Axis as NdAxis};
use std::path::{Path, PathBuf};

/// Merges several recordings into one spectrogram along frequency or time
pub struct SpectrogramCombiner {
    params: CombineParams,
    loader: SpectrogramLoader,
}

impl SpectrogramCombiner {
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

    /// Stack adjacent frequency bands in input order.
    ///
    /// Every file must share the first file's time axis; that axis is kept.
    pub fn combine_frequency<P: AsRef<Path>>(&self, paths: &[P]) -> SpectroResult<CombinedSpectrogram> {
        require_two(paths, CombineMode::Frequency)?;
        let files = identify(paths).map_err(to_combine_error)?;

        let mut parts: Vec<Spectrogram> = Vec::with_capacity(files.len());
        for (path, _) in &files {
            let spectrogram = self.loader.load(path)?;
            if let Some(first) = parts.first() {
                if !axes_match(&spectrogram.time, &first.time, self.params.axis_tolerance) {
                    return Err(SpectroError::Combine(format!(
                        "time axis of {} does not match {}; cannot frequency-combine",
                        path.display(),
                        files[0].0.display()
                    )));
                }
            }
            parts.push(spectrogram);
        }

        let views: Vec<_> = parts.iter().map(|s| s.data.view()).collect();
        let data = concatenate(NdAxis(0), &views)
            .map_err(|e| SpectroError::Combine(format!("cannot stack frequency bands: {}", e)))?;
        let freq_views: Vec<_> = parts.iter().map(|s| s.freqs.view()).collect();
        let freqs = concatenate(NdAxis(0), &freq_views)
            .map_err(|e| SpectroError::Combine(format!("cannot join frequency axes: {}", e)))?;

        let first = &files[0].1;
        let filename = format!("{}_{}_{}_freq_combined", first.station, first.date, first.time_of_day);
        self.finish(parts, data, freqs, None, files, CombineMode::Frequency, filename)
    }

    /// Join consecutive segments in time-of-day order.
    ///
    /// Each later segment is shifted by the running last time plus its own first
    /// sampling interval, so the merged axis never steps backwards. Frequency axes
    /// are not re-validated here.
    pub fn combine_time<P: AsRef<Path>>(&self, paths: &[P]) -> SpectroResult<CombinedSpectrogram> {
        require_two(paths, CombineMode::Time)?;
        let files = sort_by_time_of_day(identify(paths).map_err(to_combine_error)?);

        let mut parts: Vec<Spectrogram> = Vec::with_capacity(files.len());
        let mut time: Vec<f64> = Vec::new();

        for (path, _) in &files {
            let spectrogram = self.loader.load(path)?;
            if spectrogram.time.len() < 2 {
                return Err(SpectroError::Combine(format!(
                    "{} has fewer than 2 time samples",
                    path.display()
                )));
            }

            match time.last().copied() {
                None => time.extend(spectrogram.time.iter()),
                Some(last) => {
                    let dt = spectrogram.time[1] - spectrogram.time[0];
                    let shift = last + dt;
                    log::debug!("Shifting {} by {:.3} s (dt = {:.3} s)", path.display(), shift, dt);
                    time.extend(spectrogram.time.iter().map(|t| t + shift));
                }
            }
            parts.push(spectrogram);
        }

        let views: Vec<_> = parts.iter().map(|s| s.data.view()).collect();
        let data = concatenate(NdAxis(1), &views)
            .map_err(|e| SpectroError::Combine(format!("cannot join time segments: {}", e)))?;
        let freqs = parts[0].freqs.clone();

        let first = &files[0].1;
        let filename = format!("{}_{}_combined_time", first.station, first.date);
        self.finish(parts, data, freqs, Some(Axis::from(time)), files, CombineMode::Time, filename)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        parts: Vec<Spectrogram>,
        data: IntensityImage,
        freqs: Axis,
        time: Option<Axis>,
        files: Vec<(PathBuf, FileIdentity)>,
        mode: CombineMode,
        filename: String,
    ) -> SpectroResult<CombinedSpectrogram> {
        let mut parts = parts.into_iter();
        let reference = parts
            .next()
            .ok_or_else(|| SpectroError::Combine("no input files".to_string()))?;
        let ut_start_sec = reference.ut_start_seconds();
        let time = time.unwrap_or(reference.time);
        let sources: Vec<PathBuf> = files.into_iter().map(|(path, _)| path).collect();

        let header = build_combined_header(&reference.header, mode, &sources, data.dim(), &freqs, &time);
        let spectrogram = Spectrogram::new(data, freqs, time, header)?;

        log::info!(
            "Combined {} files by {} into {} ({} x {})",
            sources.len(),
            mode,
            filename,
            spectrogram.n_channels(),
            spectrogram.n_samples()
        );

        Ok(CombinedSpectrogram {
            spectrogram,
            sources,
            combine_mode: mode,
            filename,
            ut_start_sec,
        })
    }
}

impl Default for SpectrogramCombiner {
    fn default() -> Self {
        Self::new()
    }
}

fn require_two<P>(paths: &[P], mode: CombineMode) -> SpectroResult<()> {
    if paths.len() < 2 {
        return Err(SpectroError::Combine(format!(
            "need at least 2 files to combine by {}, got {}",
            mode,
            paths.len()
        )));
    }
    Ok(())
}

fn to_combine_error(e: SpectroError) -> SpectroError {
    match e {
        SpectroError::Format(msg) => SpectroError::Combine(msg),
        other => other,
    }
}

fn finite_range(values: &Axis) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Copy of `base` with merge provenance: method, source count, axis ranges,
/// matrix size and a short history naming the first and last sources.
pub fn build_combined_header(
    base: &Header,
    mode: CombineMode,
    sources: &[PathBuf],
    shape: (usize, usize),
    freqs: &Axis,
    time: &Axis,
) -> Header {
    let mut header = base.clone();
    let method = mode.to_string();

    header.set("COMBINED", true, Some("Data are combined from multiple FITS files"));
    header.set("COMBMETH", method.as_str(), Some("Combine method (time|frequency)"));
    header.set("NFILES", sources.len(), Some("Number of source FITS files used"));

    if let Some((lo, hi)) = finite_range(freqs) {
        header.set("FREQMIN", lo, Some("Min frequency (MHz)"));
        header.set("FREQMAX", hi, Some("Max frequency (MHz)"));
    }
    if let Some((lo, hi)) = finite_range(time) {
        header.set("TMIN", lo, Some("Min time (s)"));
        header.set("TMAX", hi, Some("Max time (s)"));
    }

    let (rows, cols) = shape;
    header.set("NAXIS", 2i64, None);
    header.set("NAXIS1", cols, None);
    header.set("NAXIS2", rows, None);

    header.add_history("Combined by callisto");
    header.add_history(&format!("Combine method: {}", method));
    let base_name = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string())
    };
    if let (Some(first), Some(last)) = (sources.first(), sources.last()) {
        header.add_history(&format!("First source: {}", base_name(first)));
        header.add_history(&format!("Last source: {}", base_name(last)));
    }
    header
}

pub fn combine_frequency<P: AsRef<Path>>(paths: &[P]) -> SpectroResult<CombinedSpectrogram> {
    SpectrogramCombiner::new().combine_frequency(paths)
}

pub fn combine_time<P: AsRef<Path>>(paths: &[P]) -> SpectroResult<CombinedSpectrogram> {
    SpectrogramCombiner::new().combine_time(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_spectrogram;
    use ndarray::{Array1, Array2};

    fn write_file(dir: &Path, name: &str, freqs: Vec<f64>, time: Vec<f64>, value: f32, time_obs: &str) -> PathBuf {
        let data = Array2::<f32>::from_elem((freqs.len(), time.len()), value);
        let mut header = Header::new();
        header.set("TIME-OBS", time_obs, None);
        let spec = Spectrogram::new(data, Array1::from(freqs), Array1::from(time), header).unwrap();
        let path = dir.join(name);
        write_spectrogram(&spec, &path).unwrap();
        path
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.25).collect()
    }

    #[test]
    fn test_frequency_combine_stacks_rows() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "BIR_20240101_120000_00.fit", vec![80.0, 70.0], ramp(5), 1.0, "12:00:00");
        let b = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![60.0, 50.0, 40.0], ramp(5), 2.0, "12:00:00");

        let combined = combine_frequency(&[&a, &b]).unwrap();
        let spec = &combined.spectrogram;
        assert_eq!(spec.data.dim(), (5, 5));
        assert_eq!(spec.freqs.to_vec(), vec![80.0, 70.0, 60.0, 50.0, 40.0]);
        assert_eq!(spec.data[[1, 0]], 1.0);
        assert_eq!(spec.data[[2, 0]], 2.0);
        assert_eq!(combined.filename, "BIR_20240101_120000_freq_combined");
        assert_eq!(combined.ut_start_sec, Some(43200.0));
        assert_eq!(spec.header.get_str("COMBMETH"), Some("frequency"));
        assert_eq!(spec.header.get_i64("NFILES"), Some(2));
        assert_eq!(spec.header.get_f64("FREQMIN"), Some(40.0));
    }

    #[test]
    fn test_frequency_combine_rejects_time_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "BIR_20240101_120000_00.fit", vec![80.0], ramp(5), 1.0, "12:00:00");
        let b = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![60.0], ramp(6), 1.0, "12:00:00");
        assert!(matches!(combine_frequency(&[a, b]), Err(SpectroError::Combine(_))));
    }

    #[test]
    fn test_time_combine_shifts_segments() {
        let dir = tempfile::tempdir().unwrap();
        let late = write_file(dir.path(), "BIR_20240101_121500_01.fit", vec![80.0, 70.0], ramp(4), 2.0, "12:15:00");
        let early = write_file(dir.path(), "BIR_20240101_120000_01.fit", vec![80.0, 70.0], ramp(4), 1.0, "12:00:00");

        let combined = combine_time(&[&late, &early]).unwrap();
        let spec = &combined.spectrogram;
        assert_eq!(spec.data.dim(), (2, 8));
        assert_eq!(spec.time.to_vec(), vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75]);
        assert_eq!(spec.data[[0, 3]], 1.0);
        assert_eq!(spec.data[[0, 4]], 2.0);
        assert_eq!(combined.sources, vec![early, late]);
        assert_eq!(combined.filename, "BIR_20240101_combined_time");
        assert_eq!(combined.combine_mode, CombineMode::Time);
        assert_eq!(combined.ut_start_sec, Some(43200.0));
    }

    #[test]
    fn test_single_file_is_combine_error() {
        assert!(matches!(combine_time(&["BIR_20240101_120000_01.fit"]), Err(SpectroError::Combine(_))));
        assert!(matches!(combine_frequency::<&str>(&[]), Err(SpectroError::Combine(_))));
    }

    #[test]
    fn test_combined_header_history() {
        let sources = vec![PathBuf::from("/a/X_1_2_3.fit"), PathBuf::from("/a/X_1_2_4.fit")];
        let header = build_combined_header(
            &Header::new(),
            CombineMode::Time,
            &sources,
            (2, 3),
            &Array1::from(vec![10.0, 20.0]),
            &Array1::from(vec![0.0, 1.0, 2.0]),
        );
        let history: Vec<&str> = header.history().collect();
        assert_eq!(history[1], "Combine method: time");
        assert_eq!(history[2], "First source: X_1_2_3.fit");
        assert_eq!(history[3], "Last source: X_1_2_4.fit");
        assert_eq!(header.get_i64("NAXIS1"), Some(3));
        assert_eq!(header.get_bool("COMBINED"), Some(true));
    }

    #[test]
    fn test_combiner_uses_configured_loader() {
        use crate::io::fits::{BinTable, FitsFile, Hdu, HduData, TableColumn};
        use crate::io::LoaderParams;

        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = [("00", vec![80.0, 70.0]), ("01", vec![60.0])]
            .into_iter()
            .map(|(id, freqs)| {
                let fits = FitsFile {
                    hdus: vec![
                        Hdu {
                            header: Header::new(),
                            data: HduData::Image(Array2::<f64>::ones((freqs.len(), 3)).into_dyn()),
                        },
                        Hdu {
                            header: Header::new(),
                            data: HduData::Table(BinTable {
                                columns: vec![
                                    TableColumn { name: "MHZ".to_string(), rows: vec![freqs] },
                                    TableColumn { name: "SEC".to_string(), rows: vec![ramp(3)] },
                                ],
                            }),
                        },
                    ],
                };
                let path = dir.path().join(format!("BIR_20240101_120000_{}.fit", id));
                fits.write(&path).unwrap();
                path
            })
            .collect();

        let loader = SpectrogramLoader::with_params(LoaderParams {
            frequency_columns: vec!["mhz".to_string()],
            time_columns: vec!["sec".to_string()],
        });
        let combined = SpectrogramCombiner::with_loader(CombineParams::default(), loader)
            .combine_frequency(&paths)
            .unwrap();
        assert_eq!(combined.spectrogram.freqs.to_vec(), vec![80.0, 70.0, 60.0]);
        assert_eq!(combined.spectrogram.time.to_vec(), ramp(3));
    }
}
