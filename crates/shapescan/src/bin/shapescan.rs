//! `shapescan` command line: scan photos, print the reference sheet, dump the
//! default configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use shapescan::fiducial::{render_sheet, SHEET_4X4_V1};
use shapescan::load::encode_gray_png;
use shapescan::{write_outputs, ScanConfig, ScanContext, ScanError, ScanPipeline};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "shapescan")]
#[command(about = "Turn a photo of an object on the A4 reference sheet into SVG and DXF outlines")]
#[command(version)]
struct Cli {
    /// Log verbosity.
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a photo and write output.svg / output.dxf.
    Scan {
        /// JPEG or PNG photo of the object on the reference sheet.
        image: PathBuf,
        /// JSON configuration; missing fields take their defaults.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory receiving output.svg and output.dxf.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Write a JSON report of the run.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Render the printable reference sheet as PNG.
    Sheet {
        #[arg(long, default_value = "sheet.png")]
        out: PathBuf,
        /// Raster density; 11.811 px/mm is 300 dpi.
        #[arg(long, default_value_t = 11.811)]
        px_per_mm: f64,
        /// Take the sheet layout from this configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print (or write) the default configuration as JSON.
    Config {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(level: LogLevel) {
    #[cfg(feature = "tracing")]
    {
        let directive = shapescan::core::default_directive(level.filter());
        shapescan::core::init_tracing(false, &directive);
        // no-op when the subscriber already bridged `log`
        let _ = tracing_log::LogTracer::init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = shapescan::core::init_with_level(level.filter());
    }
}

fn load_config(path: Option<&Path>) -> CliResult<ScanConfig> {
    match path {
        Some(p) => ScanConfig::load_json(p)
            .map_err(|e| -> CliError { format!("cannot read config {}: {e}", p.display()).into() }),
        None => Ok(ScanConfig::default()),
    }
}

fn run_scan(
    image: &Path,
    config: Option<&Path>,
    out_dir: &Path,
    report: Option<&Path>,
) -> CliResult<()> {
    let config = load_config(config)?;
    let pipeline = ScanPipeline::new(config)?;
    let bytes = fs::read(image)
        .map_err(|e| -> CliError { format!("cannot read {}: {e}", image.display()).into() })?;

    let request_id = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    let ctx = ScanContext::new(request_id);

    let output = pipeline.run(&bytes, &ctx)?;
    let files = write_outputs(&output, out_dir)?;
    println!(
        "scale {} px/mm, {} contours, {:.2} x {:.2} mm",
        output.px_per_mm(),
        output.contours_count(),
        output.geometry.width(),
        output.geometry.height()
    );
    println!("{}", files.svg.display());
    println!("{}", files.dxf.display());

    if let Some(path) = report {
        fs::write(path, serde_json::to_string_pretty(&output.report())?)?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

fn run_sheet(out: &Path, px_per_mm: f64, config: Option<&Path>) -> CliResult<()> {
    let layout = load_config(config)?.sheet;
    let raster = render_sheet(&layout, &SHEET_4X4_V1, px_per_mm)?;
    fs::write(out, encode_gray_png(&raster)?)?;
    println!(
        "{} ({} x {} px, layout {})",
        out.display(),
        raster.width(),
        raster.height(),
        layout.version
    );
    Ok(())
}

fn run_config(out: Option<&Path>) -> CliResult<()> {
    let config = ScanConfig::default();
    match out {
        Some(path) => {
            config.write_json(path)?;
            println!("{}", path.display());
        }
        None => println!("{}", config.to_json()?),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match &cli.command {
        Commands::Scan {
            image,
            config,
            out_dir,
            report,
        } => run_scan(image, config.as_deref(), out_dir, report.as_deref()),
        Commands::Sheet {
            out,
            px_per_mm,
            config,
        } => run_sheet(out, *px_per_mm, config.as_deref()),
        Commands::Config { out } => run_config(out.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ScanError>() {
                Some(scan) => eprintln!("error [{}]: {scan}", scan.kind()),
                None => eprintln!("error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}
