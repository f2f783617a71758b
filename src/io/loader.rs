use crate::io::fits::{BinTable, FitsFile, HduData};
use crate::types::{
    Axis, AxisInfo, AxisSource, Header, IntensityImage, Orientation, Spectrogram, SpectroError,
    SpectroResult,
};
use ndarray::{Array1, ArrayD, Axis as NdAxis, Ix2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Physical axis a table column or WCS axis can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisKind {
    Frequency,
    Time,
}

impl AxisKind {
    /// FITS image axis number carrying this kind in the instrument layout
    fn wcs_axis(self) -> usize {
        match self {
            AxisKind::Time => 1,
            AxisKind::Frequency => 2,
        }
    }
}

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderParams {
    /// Accepted column names for the frequency axis, in precedence order
    pub frequency_columns: Vec<String>,
    /// Accepted column names for the time axis, in precedence order
    pub time_columns: Vec<String>,
}

impl Default for LoaderParams {
    fn default() -> Self {
        Self {
            frequency_columns: vec!["frequency".to_string(), "freq".to_string()],
            time_columns: vec!["time".to_string(), "times".to_string()],
        }
    }
}

impl LoaderParams {
    fn names(&self, kind: AxisKind) -> &[String] {
        match kind {
            AxisKind::Frequency => &self.frequency_columns,
            AxisKind::Time => &self.time_columns,
        }
    }
}

/// Reads instrument files into normalized spectrograms
pub struct SpectrogramLoader {
    params: LoaderParams,
}

impl SpectrogramLoader {
    pub fn new() -> Self {
        Self {
            params: LoaderParams::default(),
        }
    }

    pub fn with_params(params: LoaderParams) -> Self {
        Self { params }
    }

    /// Load one file; the result always satisfies `data.dim() == (freqs.len(), time.len())`
    pub fn load<P: AsRef<Path>>(&self, path: P) -> SpectroResult<Spectrogram> {
        let path = path.as_ref();
        let fits = FitsFile::open(path)?;
        let spectrogram = self.from_fits(&fits)?;

        log::info!(
            "Loaded {} ({} channels x {} samples)",
            path.display(),
            spectrogram.n_channels(),
            spectrogram.n_samples()
        );
        Ok(spectrogram)
    }

    /// Build a spectrogram from an already parsed container
    pub fn from_fits(&self, fits: &FitsFile) -> SpectroResult<Spectrogram> {
        let primary = fits
            .primary()
            .ok_or_else(|| SpectroError::Format("file has no primary HDU".to_string()))?;
        let header = primary.header.clone();

        let image = match &primary.data {
            HduData::Image(image) => image,
            _ => return Err(SpectroError::Format("primary HDU has no data".to_string())),
        };
        let data = reduce_to_2d(image)?;
        let (rows, cols) = data.dim();

        let freq = self.resolve_axis(fits, &header, AxisKind::Frequency, rows);
        let time = self.resolve_axis(fits, &header, AxisKind::Time, cols);

        if freq.is_none() {
            log::debug!("Frequency axis missing, using index array");
        }
        if time.is_none() {
            log::debug!("Time axis missing, using index array");
        }
        let freqs = freq.unwrap_or_else(|| (index_axis(rows), AxisSource::Index));
        let times = time.unwrap_or_else(|| (index_axis(cols), AxisSource::Index));

        let (data, freqs, times, axes) = repair_orientation(data, freqs, times);
        if !axes.is_authoritative() {
            log::warn!(
                "Axes are partly synthesized (frequency: {:?}, time: {:?}, orientation: {:?})",
                axes.freq_source,
                axes.time_source,
                axes.orientation
            );
        }

        let mut spectrogram = Spectrogram::new(data, freqs, times, header)?;
        spectrogram.axes = axes;
        Ok(spectrogram)
    }

    /// Table column first, then linear WCS keywords
    fn resolve_axis(
        &self,
        fits: &FitsFile,
        header: &Header,
        kind: AxisKind,
        length: usize,
    ) -> Option<(Axis, AxisSource)> {
        fits.tables()
            .find_map(|table| self.axis_from_table(table, kind))
            .map(|axis| (axis, AxisSource::Table))
            .or_else(|| axis_from_header(header, kind.wcs_axis(), length).map(|axis| (axis, AxisSource::HeaderWcs)))
    }

    fn axis_from_table(&self, table: &BinTable, kind: AxisKind) -> Option<Axis> {
        let column = self
            .params
            .names(kind)
            .iter()
            .find_map(|name| table.column(name))?;
        // Scalar cells: one axis value per table row. A shorter column sharing the
        // table with a longer one is NaN-padded at the end.
        if column.rows.len() > 1 && column.rows.iter().all(|row| row.len() == 1) {
            let mut values: Vec<f64> = column.rows.iter().map(|row| row[0]).collect();
            while values.last().is_some_and(|v| v.is_nan()) {
                values.pop();
            }
            return if values.is_empty() { None } else { Some(Array1::from(values)) };
        }
        // Vector cells: repeated rows carry the same axis, the first one is authoritative
        let first = column.rows.first()?;
        if first.is_empty() {
            return None;
        }
        Some(Array1::from(first.clone()))
    }
}

impl Default for SpectrogramLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a file with the default loader
pub fn load<P: AsRef<Path>>(path: P) -> SpectroResult<Spectrogram> {
    SpectrogramLoader::new().load(path)
}

/// Squeeze singleton axes, take the first slice of any extra leading axes.
///
/// Squeezing stops at two dimensions, so a `(1, N)` or `(N, 1)` block loads as
/// a single-channel or single-sample spectrogram instead of being rejected.
fn reduce_to_2d(image: &ArrayD<f64>) -> SpectroResult<IntensityImage> {
    let mut view = image.view();

    while view.ndim() > 2 {
        match view.shape().iter().position(|&len| len == 1) {
            Some(axis) => view = view.index_axis_move(NdAxis(axis), 0),
            None => break,
        }
    }
    while view.ndim() > 2 {
        view = view.index_axis_move(NdAxis(0), 0);
    }

    let view = view.into_dimensionality::<Ix2>().map_err(|_| {
        SpectroError::Format(format!(
            "expected 2D data after squeeze, got shape {:?}",
            image.shape()
        ))
    })?;
    Ok(view.mapv(|v| v as f32))
}

/// `CRVALn + (i + 1 - CRPIXn) * CDELTn` for i in 0..length
fn axis_from_header(header: &Header, axis: usize, length: usize) -> Option<Axis> {
    let crval = header.get_f64(&format!("CRVAL{}", axis))?;
    let cdelt = header.get_f64(&format!("CDELT{}", axis))?;
    let crpix = header.get_f64(&format!("CRPIX{}", axis)).unwrap_or(1.0);
    Some(Array1::from_shape_fn(length, |i| crval + (i as f64 + 1.0 - crpix) * cdelt))
}

fn index_axis(length: usize) -> Axis {
    Array1::from_shape_fn(length, |i| i as f64)
}

/// Orientation decision table, first match wins:
/// 1. `(nf, nt) == (rows, cols)`: keep.
/// 2. `(nf, nt) == (cols, rows)`: transpose.
/// 3. both lengths equal the same dimension: both axes become indices (ambiguous).
/// 4. `nf == cols`: transpose; then any axis that still disagrees becomes an index array.
fn repair_orientation(
    data: IntensityImage,
    freqs: (Axis, AxisSource),
    times: (Axis, AxisSource),
) -> (IntensityImage, Axis, Axis, AxisInfo) {
    let (rows, cols) = data.dim();
    let (mut freq_axis, mut freq_source) = freqs;
    let (mut time_axis, mut time_source) = times;
    let (nf, nt) = (freq_axis.len(), time_axis.len());

    if (nf, nt) == (rows, cols) {
        let info = AxisInfo { freq_source, time_source, orientation: Orientation::AsStored };
        return (data, freq_axis, time_axis, info);
    }

    if (nf, nt) == (cols, rows) {
        log::debug!("Data stored as (time, frequency); transposing");
        let info = AxisInfo { freq_source, time_source, orientation: Orientation::Transposed };
        return (data.reversed_axes().as_standard_layout().to_owned(), freq_axis, time_axis, info);
    }

    if nf == nt && (nf == rows || nf == cols) {
        log::warn!("Both axes have length {} matching one dimension; falling back to indices", nf);
        let info = AxisInfo {
            freq_source: AxisSource::Index,
            time_source: AxisSource::Index,
            orientation: Orientation::Ambiguous,
        };
        return (data, index_axis(rows), index_axis(cols), info);
    }

    let mut data = data;
    let mut orientation = Orientation::AsStored;
    if nf != rows && nf == cols {
        data = data.reversed_axes().as_standard_layout().to_owned();
        orientation = Orientation::Transposed;
    }

    let (rows, cols) = data.dim();
    if freq_axis.len() != rows {
        log::warn!("Frequency axis length {} does not match {} rows; regenerating", freq_axis.len(), rows);
        freq_axis = index_axis(rows);
        freq_source = AxisSource::Index;
    }
    if time_axis.len() != cols {
        log::warn!("Time axis length {} does not match {} columns; regenerating", time_axis.len(), cols);
        time_axis = index_axis(cols);
        time_source = AxisSource::Index;
    }

    (data, freq_axis, time_axis, AxisInfo { freq_source, time_source, orientation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::{Hdu, TableColumn};
    use ndarray::{array, Array2, IxDyn};

    fn fits_with(image: ArrayD<f64>, header: Header, columns: Vec<TableColumn>) -> FitsFile {
        let mut hdus = vec![Hdu { header, data: HduData::Image(image) }];
        if !columns.is_empty() {
            hdus.push(Hdu {
                header: Header::new(),
                data: HduData::Table(BinTable { columns }),
            });
        }
        FitsFile { hdus }
    }

    fn column(name: &str, values: Vec<f64>) -> TableColumn {
        TableColumn { name: name.to_string(), rows: vec![values] }
    }

    #[test]
    fn test_table_axes_as_stored() {
        let image = Array2::<f64>::zeros((3, 5)).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![column("FREQUENCY", vec![3.0, 2.0, 1.0]), column("TIME", (0..5).map(f64::from).collect())],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.data.dim(), (3, 5));
        assert_eq!(spec.freqs, array![3.0, 2.0, 1.0]);
        assert!(spec.axes.is_authoritative());
    }

    #[test]
    fn test_scalar_table_cells_form_the_axis() {
        let image = Array2::<f64>::zeros((3, 5)).into_dyn();
        let scalar_rows = |values: Vec<f64>| values.into_iter().map(|v| vec![v]).collect::<Vec<_>>();
        let fits = fits_with(
            image,
            Header::new(),
            vec![
                TableColumn { name: "FREQUENCY".to_string(), rows: scalar_rows(vec![80.0, 70.0, 60.0]) },
                TableColumn {
                    name: "TIME".to_string(),
                    rows: scalar_rows(vec![0.0, 0.25, 0.5, 0.75, 1.0]),
                },
            ],
        );
        let reread = FitsFile::from_bytes(&fits.to_bytes()).unwrap();

        let spec = SpectrogramLoader::new().from_fits(&reread).unwrap();
        assert_eq!(spec.freqs, array![80.0, 70.0, 60.0]);
        assert_eq!(spec.time, array![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(spec.axes.freq_source, AxisSource::Table);
        assert_eq!(spec.axes.time_source, AxisSource::Table);
    }

    #[test]
    fn test_repeated_vector_rows_use_the_first() {
        let image = Array2::<f64>::zeros((2, 3)).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![
                TableColumn { name: "frequency".to_string(), rows: vec![vec![45.0, 44.5]; 4] },
                TableColumn { name: "time".to_string(), rows: vec![vec![0.0, 0.25, 0.5]; 4] },
            ],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.freqs, array![45.0, 44.5]);
        assert_eq!(spec.time, array![0.0, 0.25, 0.5]);
        assert!(spec.axes.is_authoritative());
    }

    #[test]
    fn test_transposed_storage_is_repaired() {
        let image = Array2::from_shape_fn((5, 3), |(t, f)| (t * 10 + f) as f64).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![column("freq", vec![3.0, 2.0, 1.0]), column("Times", (0..5).map(f64::from).collect())],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.data.dim(), (3, 5));
        assert_eq!(spec.data[[2, 4]], 42.0);
        assert_eq!(spec.axes.orientation, Orientation::Transposed);
    }

    #[test]
    fn test_wcs_fallback() {
        let mut header = Header::new();
        header.set("CRVAL1", 0.0, None);
        header.set("CDELT1", 0.25, None);
        header.set("CRVAL2", 100.0, None);
        header.set("CDELT2", -1.0, None);
        header.set("CRPIX2", 1.0, None);
        let fits = fits_with(Array2::<f64>::zeros((2, 4)).into_dyn(), header, vec![]);

        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.time, array![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(spec.freqs, array![100.0, 99.0]);
        assert_eq!(spec.axes.freq_source, AxisSource::HeaderWcs);
    }

    #[test]
    fn test_index_fallback_and_squeeze() {
        let image = ArrayD::<f64>::zeros(IxDyn(&[1, 2, 4, 6]));
        let fits = fits_with(image, Header::new(), vec![]);
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.data.dim(), (4, 6));
        assert_eq!(spec.freqs.len(), 4);
        assert_eq!(spec.time[5], 5.0);
        assert_eq!(spec.axes.time_source, AxisSource::Index);
        assert!(!spec.axes.is_authoritative());
    }

    #[test]
    fn test_single_channel_block_is_kept_two_dimensional() {
        let image = Array2::from_shape_fn((1, 4), |(_, j)| j as f64).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![column("frequency", vec![45.0]), column("time", vec![0.0, 0.25, 0.5, 0.75])],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.data.dim(), (1, 4));
        assert_eq!(spec.freqs, array![45.0]);
        assert_eq!(spec.data[[0, 3]], 3.0);
    }

    #[test]
    fn test_ambiguous_axes_become_indices() {
        let image = Array2::<f64>::zeros((3, 5)).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![column("frequency", vec![1.0; 5]), column("time", vec![0.0; 5])],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.axes.orientation, Orientation::Ambiguous);
        assert_eq!(spec.freqs, array![0.0, 1.0, 2.0]);
        assert_eq!(spec.time.len(), 5);
    }

    #[test]
    fn test_mismatched_time_axis_regenerated() {
        let image = Array2::<f64>::zeros((3, 5)).into_dyn();
        let fits = fits_with(
            image,
            Header::new(),
            vec![column("frequency", vec![3.0, 2.0, 1.0]), column("time", vec![0.0; 7])],
        );
        let spec = SpectrogramLoader::new().from_fits(&fits).unwrap();
        assert_eq!(spec.axes.freq_source, AxisSource::Table);
        assert_eq!(spec.axes.time_source, AxisSource::Index);
        assert_eq!(spec.time.len(), 5);
    }

    #[test]
    fn test_missing_primary_data_is_format_error() {
        let fits = FitsFile {
            hdus: vec![Hdu { header: Header::new(), data: HduData::None }],
        };
        assert!(matches!(SpectrogramLoader::new().from_fits(&fits), Err(SpectroError::Format(_))));
    }

    #[test]
    fn test_one_dimensional_data_is_format_error() {
        let fits = fits_with(ArrayD::<f64>::zeros(IxDyn(&[7])), Header::new(), vec![]);
        assert!(matches!(SpectrogramLoader::new().from_fits(&fits), Err(SpectroError::Format(_))));
    }
}
