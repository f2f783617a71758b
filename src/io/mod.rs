//! File-facing modules: container format, loader and file naming

pub mod filename;
pub mod fits;
pub mod loader;

pub use filename::{is_fits_path, list_fits_files, strip_fits_suffix, FileIdentity};
pub use fits::{write_spectrogram, FitsFile};
pub use loader::{load, AxisKind, LoaderParams, SpectrogramLoader};
