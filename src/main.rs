use std::path::{Path, PathBuf};
use std::time::Instant;
use clap::{Parser, ValueEnum};

use fibermorph_rust_lib::batch::{run_batch, LogProgress};
use fibermorph_rust_lib::config::{Config, WindowUnit};
use fibermorph_rust_lib::errors::Result;
use fibermorph_rust_lib::logging::{init_logging, Verbosity};
use fibermorph_rust_lib::validation::run_validation;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "fibermorph - Hair fiber curvature analysis")]
struct Args {
    /// Path to configuration file (defaults are used when omitted)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Directory searched recursively for images
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Number of worker threads
    #[clap(short, long)]
    jobs: Option<usize>,

    /// Pixels per millimetre
    #[clap(long)]
    resolution: Option<f64>,

    /// Curvature window size
    #[clap(long)]
    window_size: Option<f64>,

    /// Unit of the window size
    #[clap(long)]
    window_unit: Option<WindowUnitArg>,

    /// Save intermediate stage images
    #[clap(long)]
    save_image: bool,

    /// Write raw window curvatures per element
    #[clap(long)]
    within_element: bool,

    /// Walk skeleton pixels along the arc before windowing
    #[clap(long)]
    order_arcs: bool,

    /// Run on synthetic arcs and a line instead, with this many arcs
    #[clap(long, value_name = "REPEATS")]
    validate: Option<usize>,

    /// More output (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[clap(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WindowUnitArg {
    Px,
    Mm,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

/// Main function
fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(Verbosity::from_flags(args.verbose, args.quiet));

    // Load configuration
    let mut config = load_config(args.config.as_deref())?;

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_directory = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_directory = output;
    }

    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }

    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }

    if let Some(window_size) = args.window_size {
        config.window_size = window_size;
    }

    if let Some(unit) = args.window_unit {
        config.window_unit = match unit {
            WindowUnitArg::Px => WindowUnit::Px,
            WindowUnitArg::Mm => WindowUnit::Mm,
        };
    }

    config.save_images |= args.save_image;
    config.within_element |= args.within_element;
    config.order_arc_pixels |= args.order_arcs;

    // Start timing
    let start_time = Instant::now();

    if let Some(repeats) = args.validate {
        let table = run_validation(&config, repeats)?;
        log::info!("Validation table written to {}", table.display());
    } else {
        config.validate()?;
        log::info!(
            "Window size {} px at {} px/mm",
            config.window_size_px(),
            config.resolution
        );

        let sink = LogProgress::new();
        let report = run_batch(&config, &sink)?;

        for failure in &report.failures {
            log::error!("{} ({}): {}", failure.id, failure.path.display(), failure.reason);
        }
        log::info!(
            "{} images summarised, {} failed",
            report.rows.len(),
            report.failures.len()
        );
    }

    // Report elapsed time
    let elapsed = start_time.elapsed();
    log::info!("Processing completed in {:.2} seconds", elapsed.as_secs_f64());

    Ok(())
}
