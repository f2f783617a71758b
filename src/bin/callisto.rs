use anyhow::{bail, Context};
use callisto::core::{reduce_noise, RfiReport};
use callisto::io::{list_fits_files, write_spectrogram};
use callisto::{
    AnalysisConfig, BurstKinematicsFitter, CombinabilityClassifier, CombineMode, FileIdentity,
    RfiCleaner, Spectrogram, SpectrogramCombiner, SpectrogramLoader,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "e-CALLISTO spectrogram analysis driver")]
struct Args {
    /// Load stage parameters from a JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print shape, axes and file identity
    Info { file: PathBuf },
    /// Report whether files can be merged, and how
    Classify {
        /// Files, or a directory to scan
        inputs: Vec<PathBuf>,
    },
    /// Merge files and write the result
    Combine {
        inputs: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Remove RFI and write the cleaned spectrogram
    Clean {
        file: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print the max-intensity trace as JSON
    Trace {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        harmonic: bool,
    },
    /// Fit the burst and print shock parameters as JSON
    Fit {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        harmonic: bool,
        /// Newkirk fold (1-4); overrides the config value
        #[arg(long)]
        fold: Option<u8>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Auto,
    Frequency,
    Time,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    match args.command {
        Command::Info { file } => info(&config, &file),
        Command::Classify { inputs } => {
            let files = expand_inputs(&inputs)?;
            let classifier = CombinabilityClassifier::with_loader(config.combine, loader(&config));
            match classifier.classify(&files) {
                Some(mode) => println!("{} files are {}-combinable", files.len(), mode),
                None => println!("{} files cannot be combined", files.len()),
            }
            Ok(())
        }
        Command::Combine { inputs, mode, output } => combine(&config, &inputs, mode, &output),
        Command::Clean { file, output } => {
            let spec = load(&config, &file)?;
            let cleaner = RfiCleaner::with_params(config.rfi);
            let result = cleaner.clean(&spec.data).context("cleaning RFI")?;
            let report = RfiReport::new(cleaner.params(), &result);

            let cleaned = Spectrogram { data: result.data, ..spec };
            write_spectrogram(&cleaned, &output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Trace { file, harmonic } => {
            let spec = prepare(&config, &file)?;
            let trace = callisto::extract_max_intensity_trace(&spec.data, &spec.freqs)?
                .with_harmonic(harmonic);
            println!("{}", serde_json::to_string_pretty(&trace)?);
            Ok(())
        }
        Command::Fit { file, harmonic, fold } => {
            let fold = fold.unwrap_or(config.fold);
            let spec = prepare(&config, &file)?;
            let trace = callisto::extract_max_intensity_trace(&spec.data, &spec.freqs)?
                .with_harmonic(harmonic);

            let fitter = BurstKinematicsFitter::with_params(config.kinematics);
            let fit = fitter.fit_trace(&trace).context("fitting burst")?;
            let summary = fitter.drift_profile(&fit, &trace)?.shock_summary(fold)?;

            let output = serde_json::json!({
                "file": file.display().to_string(),
                "equation": fit.equation(),
                "fit": fit,
                "shock": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn loader(config: &AnalysisConfig) -> SpectrogramLoader {
    SpectrogramLoader::with_params(config.loader.clone())
}

fn load(config: &AnalysisConfig, file: &Path) -> anyhow::Result<Spectrogram> {
    loader(config)
        .load(file)
        .with_context(|| format!("loading {}", file.display()))
}

/// Background-subtracted, RFI-cleaned data ready for trace extraction
fn prepare(config: &AnalysisConfig, file: &Path) -> anyhow::Result<Spectrogram> {
    let spec = load(config, file)?;
    let reduced = reduce_noise(&spec.data, &config.noise);
    let cleaned = RfiCleaner::with_params(config.rfi).clean(&reduced)?;
    Ok(Spectrogram { data: cleaned.data, ..spec })
}

fn info(config: &AnalysisConfig, file: &Path) -> anyhow::Result<()> {
    let spec = load(config, file)?;
    println!("File:        {}", file.display());
    match FileIdentity::parse(file) {
        Ok(id) => println!(
            "Identity:    station {} date {} time {} receiver {}",
            id.station, id.date, id.time_of_day, id.receiver_id
        ),
        Err(e) => println!("Identity:    unavailable ({})", e),
    }
    println!("Shape:       {} channels x {} samples", spec.n_channels(), spec.n_samples());
    if let (Some(first), Some(last)) = (spec.freqs.first(), spec.freqs.last()) {
        println!("Frequency:   {:.3} .. {:.3} MHz", first, last);
    }
    if let (Some(first), Some(last)) = (spec.time.first(), spec.time.last()) {
        println!("Time:        {:.3} .. {:.3} s", first, last);
    }
    if let Some(start) = spec.ut_start_seconds() {
        println!("UT start:    {:.1} s of day", start);
    }
    println!(
        "Axes:        frequency from {:?}, time from {:?}, {:?}",
        spec.axes.freq_source, spec.axes.time_source, spec.axes.orientation
    );
    Ok(())
}

fn combine(config: &AnalysisConfig, inputs: &[PathBuf], mode: ModeArg, output: &Path) -> anyhow::Result<()> {
    let files = expand_inputs(inputs)?;
    let mode = match mode {
        ModeArg::Frequency => CombineMode::Frequency,
        ModeArg::Time => CombineMode::Time,
        ModeArg::Auto => {
            let classifier = CombinabilityClassifier::with_loader(config.combine, loader(config));
            match classifier.classify(&files) {
                Some(mode) => mode,
                None => bail!("files are neither frequency- nor time-combinable"),
            }
        }
    };

    let combiner = SpectrogramCombiner::with_loader(config.combine, loader(config));
    let combined = match mode {
        CombineMode::Frequency => combiner.combine_frequency(&files),
        CombineMode::Time => combiner.combine_time(&files),
    }
    .with_context(|| format!("combining {} files by {}", files.len(), mode))?;

    write_spectrogram(&combined.spectrogram, output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{} -> {} ({} x {})",
        combined.filename,
        output.display(),
        combined.spectrogram.n_channels(),
        combined.spectrogram.n_samples()
    );
    Ok(())
}

/// Directories are replaced by the FITS files they contain
fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                list_fits_files(input, false)
                    .with_context(|| format!("scanning {}", input.display()))?,
            );
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("no input files");
    }
    Ok(files)
}
