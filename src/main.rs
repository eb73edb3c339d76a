//! hvclass command line interface

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use hvclass::classify::{classify_file, classify_image};
use hvclass::config::{AppConfig, LogLevel};
use hvclass::constants::FILE_TYPE_CLASSIFICATION;
use hvclass::rgb::{PreviewStretch, SensorFamily, to_rgb};
use hvclass::{
    ClassifiedRaster, LoaderRegistry, RunContext, SpectralLibrary, filter_classes,
    filter_classes_file,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hvclass")]
#[command(author, version, about = "Mineral classification for hyperspectral imagery", long_about = None)]
struct Cli {
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Configuration file (default: user config directory)
    #[arg(long, global = true, env = "HVCLASS_CONFIG")]
    config: Option<PathBuf>,

    /// Worker threads, 0 = one per core
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Raster rows processed per tile
    #[arg(long, global = true)]
    tile_rows: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every pixel against a spectral library
    Classify(ClassifyArgs),

    /// Drop unused classes from a classification file, in place
    FilterClasses {
        /// ENVI classification header or data file
        file: PathBuf,
    },

    /// Extract a true-color composite
    Rgb {
        /// Input image (.hdr/.img or .npy)
        #[arg(short, long)]
        input: PathBuf,

        /// Output ENVI header path
        #[arg(short, long)]
        output: PathBuf,

        /// Also write an 8-bit PNG preview
        #[arg(long)]
        png: Option<PathBuf>,

        /// Lower stretch percentile for the preview
        #[arg(long, requires = "png")]
        stretch_low: Option<f64>,

        /// Upper stretch percentile for the preview
        #[arg(long, requires = "png")]
        stretch_high: Option<f64>,
    },

    /// Describe an image, classification or spectral library
    Info {
        /// File to inspect
        file: PathBuf,
    },
}

#[derive(Args)]
struct ClassifyArgs {
    /// Input image (.hdr/.img or .npy)
    #[arg(short, long)]
    input: PathBuf,

    /// Reference library (.sli or .csv)
    #[arg(short, long)]
    library: PathBuf,

    /// Output ENVI header path
    #[arg(short, long)]
    output: PathBuf,

    /// Minimum similarity in [0, 1]
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Restrict to this library class (repeatable)
    #[arg(long = "class", value_name = "NAME")]
    classes: Vec<String>,

    /// File with one class name per line
    #[arg(long)]
    classes_file: Option<PathBuf>,

    /// Interpolate the library onto the image wavelengths
    #[arg(long)]
    resample: bool,

    /// Drop unused classes before writing
    #[arg(long)]
    filter: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Explicit `--config` must load; the default location is best effort.
fn load_config(path: Option<&Path>) -> Result<(AppConfig, bool)> {
    match path {
        Some(path) => {
            let config = AppConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            Ok((config, true))
        }
        None => match AppConfig::load_from_default_path() {
            Some(config) => Ok((config, true)),
            None => Ok((AppConfig::default(), false)),
        },
    }
}

fn setup_logging(cli: &Cli, config: &AppConfig, from_file: bool) {
    let shift = i32::from(cli.verbose) - i32::from(cli.quiet);
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if shift != 0 {
        builder.filter_level(LogLevel::Info.shifted(shift).to_level_filter());
    } else if from_file {
        builder.filter_level(config.log_level.to_level_filter());
    }
    builder.format_timestamp(None).init();
}

fn progress_bar(quiet: bool, msg: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} rows ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb
}

fn run_context(cli: &Cli, config: &AppConfig, pb: &ProgressBar) -> RunContext {
    let mut ctx = config.run_context();
    if let Some(threads) = cli.threads {
        ctx = ctx.with_threads(threads);
    }
    if let Some(tile_rows) = cli.tile_rows {
        ctx = ctx.with_tile_rows(tile_rows);
    }
    let pb = pb.clone();
    ctx.with_progress(move |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
}

/// Class names from a file: one per line, `#` starts a comment.
fn read_classes_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read class list {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn cmd_classify(args: &ClassifyArgs, config: &AppConfig, ctx: &RunContext) -> Result<()> {
    let library = SpectralLibrary::open(&args.library)
        .with_context(|| format!("Failed to load library {}", args.library.display()))?;

    let mut options = config.classification_config();
    if let Some(threshold) = args.threshold {
        options = options.with_threshold(threshold);
    }
    if args.resample {
        options = options.with_resample_library(true);
    }
    let mut names = args.classes.clone();
    if let Some(path) = &args.classes_file {
        names.extend(read_classes_file(path)?);
    }
    if !names.is_empty() {
        options = options.with_class_names(names);
    }

    let start = Instant::now();
    let classified = if args.filter {
        let image = LoaderRegistry::new()
            .open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        let mut classified = classify_image(image.as_ref(), &library, &options, ctx)
            .context("Classification failed")?;
        let summary = filter_classes(&mut classified)?;
        log::info!("Removed {} unused classes", summary.removed.len());
        classified
            .write_envi(&args.output)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        classified
    } else {
        classify_file(&args.input, &args.output, &library, &options, ctx)
            .with_context(|| format!("Failed to classify {}", args.input.display()))?
    };

    print_class_counts(&classified);
    done("Classification", &args.output, start.elapsed());
    Ok(())
}

fn cmd_rgb(
    input: &Path,
    output: &Path,
    png: Option<&Path>,
    stretch: PreviewStretch,
    ctx: &RunContext,
) -> Result<()> {
    let start = Instant::now();
    let image = LoaderRegistry::new()
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let rgb = to_rgb(image.as_ref(), ctx).context("RGB extraction failed")?;
    rgb.write_envi(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    if let Some(png) = png {
        rgb.write_png(png, &stretch)
            .with_context(|| format!("Failed to write preview {}", png.display()))?;
    }
    println!("Sensor: {}", rgb.sensor());
    done("RGB composite", output, start.elapsed());
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "sli" || ext == "csv" {
        let library = SpectralLibrary::open(path)
            .with_context(|| format!("Failed to load library {}", path.display()))?;
        println!("File: {}", path.display());
        println!("Spectral library: {} entries", library.len());
        if let Some((lo, hi)) = library.wavelengths().range() {
            println!(
                "Wavelengths: {} points, {:.2} - {:.2} nm",
                library.wavelengths().len(),
                lo,
                hi
            );
        }
        for name in library.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let image = LoaderRegistry::new()
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let shape = image.shape();
    println!("File: {}", path.display());
    println!(
        "Dimensions: {} x {} x {} bands",
        shape.cols, shape.rows, shape.bands
    );

    if image.metadata().get_scalar("file type") == Some(FILE_TYPE_CLASSIFICATION) {
        let classified = ClassifiedRaster::read_envi(path)
            .with_context(|| format!("Failed to read classification {}", path.display()))?;
        print_class_counts(&classified);
        return Ok(());
    }

    match image.wavelengths().range() {
        Some((lo, hi)) => println!("Wavelengths: {:.2} - {:.2} nm", lo, hi),
        None => println!("Wavelengths: not declared"),
    }
    if let Some(nodata) = image.nodata_value() {
        println!("NoData: {}", nodata);
    }
    match SensorFamily::detect(image.as_ref()) {
        Ok(sensor) => {
            let table = sensor.table();
            println!(
                "Sensor: {} (RGB bands {}, {}, {})",
                sensor, table.red.band, table.green.band, table.blue.band
            );
        }
        Err(_) => println!("Sensor: unknown"),
    }
    Ok(())
}

fn print_class_counts(classified: &ClassifiedRaster) {
    let total = (classified.rows() * classified.cols()).max(1);
    println!("Classes: {}", classified.catalog().len());
    for (name, count) in classified
        .catalog()
        .names()
        .zip(classified.class_counts())
    {
        println!(
            "  {:<30} {:>10} ({:.1}%)",
            name,
            count,
            100.0 * count as f64 / total as f64
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, from_file) = load_config(cli.config.as_deref())?;
    setup_logging(&cli, &config, from_file);
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    let pb = progress_bar(cli.quiet > 0, "Processing");
    let ctx = run_context(&cli, &config, &pb);

    let result = match &cli.command {
        Commands::Classify(args) => cmd_classify(args, &config, &ctx),
        Commands::FilterClasses { file } => {
            let summary = filter_classes_file(file)
                .with_context(|| format!("Failed to filter {}", file.display()))?;
            println!(
                "Classes: {} -> {}",
                summary.classes_before, summary.classes_after
            );
            for name in &summary.removed {
                println!("  removed {}", name);
            }
            Ok(())
        }
        Commands::Rgb {
            input,
            output,
            png,
            stretch_low,
            stretch_high,
        } => {
            let stretch = PreviewStretch::new(
                stretch_low.unwrap_or(config.preview_stretch.low),
                stretch_high.unwrap_or(config.preview_stretch.high),
            )?;
            cmd_rgb(input, output, png.as_deref(), stretch, &ctx)
        }
        Commands::Info { file } => cmd_info(file),
    };
    pb.finish_and_clear();
    result
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
