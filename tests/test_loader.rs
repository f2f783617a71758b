use callisto::io::fits::{BinTable, FitsFile, Hdu, HduData, TableColumn};
use callisto::io::{load, write_spectrogram};
use callisto::{AxisSource, Header, Orientation, Spectrogram};
use ndarray::{Array1, Array2};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn descending_freqs(n: usize) -> Vec<f64> {
    (0..n).map(|i| 870.0 - i as f64 * 4.0).collect()
}

#[test]
fn test_gzip_round_trip_keeps_shape_and_header() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BIR_20240101_120000_01.fit.gz");

    let data = Array2::from_shape_fn((20, 36), |(i, j)| (i * 100 + j) as f32);
    let mut header = Header::new();
    header.set("TIME-OBS", "12:00:00.250", None);
    header.set("INSTRUME", "BIR", Some("station"));
    let spec = Spectrogram::new(
        data.clone(),
        Array1::from(descending_freqs(20)),
        Array1::from_shape_fn(36, |j| j as f64 * 0.25),
        header,
    )
    .unwrap();
    write_spectrogram(&spec, &path).expect("Failed to write gzip FITS");

    let loaded = load(&path).expect("Failed to load gzip FITS");
    assert_eq!(loaded.data.dim(), (loaded.freqs.len(), loaded.time.len()));
    assert_eq!(loaded.data, data);
    assert_eq!(loaded.freqs[19], 794.0);
    assert_eq!(loaded.header.get_str("INSTRUME"), Some("BIR"));
    assert_eq!(loaded.ut_start_seconds(), Some(43200.25));
    assert!(loaded.axes.is_authoritative());
    println!("Loaded {} x {} from {}", loaded.n_channels(), loaded.n_samples(), path.display());
}

#[test]
fn test_time_major_storage_is_transposed_on_load() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ALASKA_20230512_101500_59.fits");

    // stored as (time, frequency)
    let stored = Array2::from_shape_fn((12, 5), |(t, f)| (t * 10 + f) as f64);
    let fits = FitsFile {
        hdus: vec![
            Hdu { header: Header::new(), data: HduData::Image(stored.into_dyn()) },
            Hdu {
                header: Header::new(),
                data: HduData::Table(BinTable {
                    columns: vec![
                        TableColumn { name: "Frequency".to_string(), rows: vec![descending_freqs(5)] },
                        TableColumn {
                            name: "Time".to_string(),
                            rows: vec![(0..12).map(|t| t as f64 * 0.25).collect()],
                        },
                    ],
                }),
            },
        ],
    };
    fits.write(&path).expect("Failed to write FITS");

    let loaded = load(&path).expect("Failed to load FITS");
    assert_eq!(loaded.data.dim(), (5, 12));
    assert_eq!(loaded.data[[3, 7]], 73.0);
    assert_eq!(loaded.axes.orientation, Orientation::Transposed);
}

#[test]
fn test_header_wcs_axes_without_table() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("GLASGOW_20240101_000000_01.fit");

    let mut header = Header::new();
    header.set("CRVAL1", 0.0, None);
    header.set("CDELT1", 0.25, None);
    header.set("CRPIX1", 1.0, None);
    header.set("CRVAL2", 45.0, None);
    header.set("CDELT2", 0.5, None);
    header.set("CRPIX2", 2.0, None);
    let fits = FitsFile {
        hdus: vec![Hdu {
            header,
            data: HduData::Image(Array2::<f64>::zeros((4, 8)).into_dyn()),
        }],
    };
    fits.write(&path).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.freqs.to_vec(), vec![44.5, 45.0, 45.5, 46.0]);
    assert_eq!(loaded.time[7], 1.75);
    assert_eq!(loaded.axes.freq_source, AxisSource::HeaderWcs);
    assert_eq!(loaded.axes.time_source, AxisSource::HeaderWcs);
}

#[test]
fn test_missing_file_and_garbage_are_errors() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    assert!(load(dir.path().join("nope.fit")).is_err());

    let garbage = dir.path().join("garbage.fit");
    std::fs::write(&garbage, b"this is not a FITS file").unwrap();
    assert!(matches!(load(&garbage), Err(callisto::SpectroError::Format(_))));
}
