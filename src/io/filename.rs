use crate::types::{SpectroError, SpectroResult};
use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Compressed and uncompressed FITS suffixes, matched case-insensitively
fn fits_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"(?i)\.fits?(\.gz)?$").expect("valid suffix pattern"))
}

/// Identity of a recording parsed from the instrument naming convention
/// `STATION_YYYYMMDD_HHMMSS[_HHMMSS]_RECEIVERID.fit[.gz]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    pub station: String,
    /// YYYYMMDD
    pub date: String,
    /// HHMMSS
    pub time_of_day: String,
    /// Trailing token (receiver / focus code)
    pub receiver_id: String,
}

impl FileIdentity {
    /// Parse the file name component of `path`
    pub fn parse<P: AsRef<Path>>(path: P) -> SpectroResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SpectroError::Format(format!("no file name in {}", path.display())))?;

        let stem = strip_fits_suffix(name);
        let tokens: Vec<&str> = stem.split('_').collect();
        if tokens.len() < 4 {
            return Err(SpectroError::Format(format!(
                "invalid CALLISTO file name '{}': expected STATION_DATE_TIME_ID",
                name
            )));
        }

        Ok(Self {
            station: tokens[0].to_string(),
            date: tokens[1].to_string(),
            time_of_day: tokens[2].to_string(),
            receiver_id: tokens[tokens.len() - 1].to_string(),
        })
    }

    /// Time-of-day token as a clock time
    pub fn clock_time(&self) -> SpectroResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.time_of_day, "%H%M%S").map_err(|e| {
            SpectroError::Format(format!("invalid time of day '{}': {}", self.time_of_day, e))
        })
    }

    /// Time-of-day token as seconds since midnight
    pub fn seconds_of_day(&self) -> SpectroResult<u32> {
        self.clock_time().map(|t| t.num_seconds_from_midnight())
    }
}

/// True if the path carries a `.fit`, `.fits`, `.fit.gz` or `.fits.gz` suffix
pub fn is_fits_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| fits_suffix().is_match(n))
        .unwrap_or(false)
}

/// File name without its FITS suffix; other names are returned unchanged
pub fn strip_fits_suffix(name: &str) -> &str {
    match fits_suffix().find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// FITS files in `dir`, sorted case-insensitively by file name.
///
/// A missing directory yields an empty list.
pub fn list_fits_files<P: AsRef<Path>>(dir: P, recursive: bool) -> SpectroResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        log::debug!("Not a directory, nothing to list: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_fits_files(dir, recursive, &mut files)?;
    files.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });

    log::debug!("Found {} FITS file(s) in {}", files.len(), dir.display());
    Ok(files)
}

fn collect_fits_files(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> SpectroResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_fits_files(&path, recursive, files)?;
            }
        } else if is_fits_path(&path) {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_name() {
        let id = FileIdentity::parse("/data/BIR_20240101_120000_01.fit.gz").unwrap();
        assert_eq!(id.station, "BIR");
        assert_eq!(id.date, "20240101");
        assert_eq!(id.time_of_day, "120000");
        assert_eq!(id.receiver_id, "01");
        assert_eq!(id.seconds_of_day().unwrap(), 43200);
    }

    #[test]
    fn test_parse_name_with_end_time() {
        let id = FileIdentity::parse("ALASKA_20230512_101500_101959_59.FITS").unwrap();
        assert_eq!(id.time_of_day, "101500");
        assert_eq!(id.receiver_id, "59");
    }

    #[test]
    fn test_parse_rejects_short_names() {
        assert!(matches!(
            FileIdentity::parse("BIR_20240101_01.fit"),
            Err(SpectroError::Format(_))
        ));
    }

    #[test]
    fn test_invalid_clock_time() {
        let id = FileIdentity::parse("BIR_20240101_1200xx_01.fit").unwrap();
        assert!(id.seconds_of_day().is_err());
    }

    #[test]
    fn test_suffix_handling() {
        assert!(is_fits_path("a/BIR_20240101_120000_01.fit"));
        assert!(is_fits_path("BIR_20240101_120000_01.Fits.GZ"));
        assert!(!is_fits_path("notes.txt"));
        assert_eq!(strip_fits_suffix("X_1_2_3.fits.gz"), "X_1_2_3");
        assert_eq!(strip_fits_suffix("X_1_2_3.png"), "X_1_2_3.png");
    }

    #[test]
    fn test_list_fits_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_2.fit", "A_1.fit.gz", "readme.md"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c_3.fits"), b"").unwrap();

        let flat = list_fits_files(dir.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A_1.fit.gz", "b_2.fit"]);

        let deep = list_fits_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);

        assert!(list_fits_files(dir.path().join("missing"), false).unwrap().is_empty());
    }
}
