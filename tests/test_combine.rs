use callisto::io::{load, write_spectrogram};
use callisto::{
    are_frequency_combinable, are_time_combinable, classify, combine_frequency, combine_time,
    CombineMode, Header, Spectrogram,
};
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_recording(dir: &Path, name: &str, freqs: Vec<f64>, n_samples: usize, time_obs: &str) -> PathBuf {
    let rows = freqs.len();
    let data = Array2::from_shape_fn((rows, n_samples), |(i, j)| (i + j) as f32);
    let mut header = Header::new();
    header.set("DATE-OBS", "2024/01/01", None);
    header.set("TIME-OBS", time_obs, None);
    let spec = Spectrogram::new(
        data,
        Array1::from(freqs),
        Array1::from_shape_fn(n_samples, |j| j as f64 * 0.25),
        header,
    )
    .unwrap();

    let path = dir.join(name);
    write_spectrogram(&spec, &path).expect("Failed to write recording");
    path
}

fn band(start: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start - i as f64 * 0.5).collect()
}

#[test]
fn test_two_receivers_frequency_combine_end_to_end() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let low = write_recording(dir.path(), "BIR_20240101_120000_00.fit", band(45.0, 10), 40, "12:00:00");
    let high = write_recording(dir.path(), "BIR_20240101_120000_01.fit", band(90.0, 14), 40, "12:00:00");
    let paths = [low.clone(), high.clone()];

    assert!(are_frequency_combinable(&paths));
    assert_eq!(classify(&paths), Some(CombineMode::Frequency));

    let combined = combine_frequency(&paths).expect("Failed to frequency-combine");
    assert_eq!(combined.combine_mode, CombineMode::Frequency);
    assert_eq!(combined.sources.len(), 2);
    assert_eq!(combined.spectrogram.freqs.len(), 24);
    assert_eq!(combined.spectrogram.data.dim(), (24, 40));
    assert_eq!(combined.spectrogram.header.get_str("COMBMETH"), Some("frequency"));
    assert_eq!(combined.spectrogram.header.get_i64("NFILES"), Some(2));

    // provenance survives a write/read cycle
    let out = dir.path().join("BIR_20240101_120000_freq_combined.fit.gz");
    write_spectrogram(&combined.spectrogram, &out).unwrap();
    let reloaded = load(&out).unwrap();
    assert_eq!(reloaded.data.dim(), (24, 40));
    assert_eq!(reloaded.header.get_str("COMBMETH"), Some("frequency"));
    assert_eq!(reloaded.header.get_i64("NFILES"), Some(2));
    let history: Vec<&str> = reloaded.header.history().collect();
    assert!(history.contains(&"First source: BIR_20240101_120000_00.fit"));
    println!("History: {:?}", history);
}

#[test]
fn test_three_segments_time_combine() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let freqs = band(80.0, 8);
    let paths = vec![
        write_recording(dir.path(), "BIR_20240101_123000_01.fit", freqs.clone(), 30, "12:30:00"),
        write_recording(dir.path(), "BIR_20240101_120000_01.fit", freqs.clone(), 40, "12:00:00"),
        write_recording(dir.path(), "BIR_20240101_121500_01.fit", freqs.clone(), 50, "12:15:00"),
    ];

    assert!(are_time_combinable(&paths));
    assert!(!are_frequency_combinable(&paths));

    let combined = combine_time(&paths).expect("Failed to time-combine");
    let spec = &combined.spectrogram;
    assert_eq!(spec.time.len(), 120);
    assert_eq!(spec.data.ncols(), 120);
    assert!(spec.time.windows(2).into_iter().all(|w| w[1] >= w[0]));
    assert_eq!(spec.time[40], spec.time[39] + 0.25);
    assert_eq!(combined.sources[0].file_name().unwrap(), "BIR_20240101_120000_01.fit");
    assert_eq!(combined.ut_start_sec, Some(43200.0));
    assert_eq!(spec.header.get_str("COMBMETH"), Some("time"));
    assert_eq!(spec.header.get_f64("TMAX"), spec.time.last().copied());
}

#[test]
fn test_unrelated_files_are_not_combinable() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let a = write_recording(dir.path(), "BIR_20240101_120000_01.fit", band(80.0, 8), 20, "12:00:00");
    let b = write_recording(dir.path(), "ALMATY_20240101_120000_01.fit", band(80.0, 8), 20, "12:00:00");

    assert!(!are_frequency_combinable(&[&a, &b]));
    assert!(!are_time_combinable(&[&a, &b]));
    assert_eq!(classify(&[&a, &b]), None);
}
