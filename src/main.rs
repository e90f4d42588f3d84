use canvasfit::config::{self, Config};
use canvasfit::run::{self, CompletionHook};
use canvasfit::{discover, output};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Flags that override `canvasfit.toml` for one run.
#[derive(clap::Args, Clone, Default)]
struct RunArgs {
    /// Canvas width in inches
    #[arg(long)]
    width_in: Option<f64>,

    /// Canvas height in inches
    #[arg(long)]
    height_in: Option<f64>,

    /// Output resolution (pixels per inch)
    #[arg(long)]
    dpi: Option<u32>,

    /// Maximum parallel workers (capped at the CPU core count)
    #[arg(long)]
    workers: Option<usize>,

    /// Files handed to a worker at a time
    #[arg(long)]
    batch_size: Option<usize>,

    /// Write the full result as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Do not run the configured completion command
    #[arg(long)]
    no_hook: bool,
}

#[derive(Parser)]
#[command(name = "canvasfit")]
#[command(about = "Fit photos onto fixed print-size canvases, in place")]
#[command(long_about = "\
Fit photos onto fixed print-size canvases, in place

Every JPEG, PNG and TIFF under the given directories is scaled to fit a page
(8.5 x 11 in at 200 dpi by default), centered on a white canvas that turns to
match the photo's orientation, and written back over the original in the same
format. Nothing is replaced until the new file is fully encoded.

Run 'canvasfit gen-config' to generate a documented canvasfit.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./canvasfit.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize every supported image in the given directories or files
    Run {
        /// Directories (searched recursively) or individual image files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        args: RunArgs,
    },
    /// List the images a run would touch, without changing anything
    Check {
        /// Directory to search
        dir: PathBuf,
    },
    /// Print a stock canvasfit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Run { paths, args } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            apply_overrides(&mut config, &args);
            config.validate()?;
            run_paths(&config, &paths, &args)?;
        }
        Command::Check { dir } => {
            let root = std::path::absolute(&dir)?;
            let found = discover::discover(&root)?;
            output::print_check_output(&root, &found);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Stderr logging at a level picked from `-v`, optionally mirrored to a file.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(w) = args.width_in {
        config.page.width_in = w;
    }
    if let Some(h) = args.height_in {
        config.page.height_in = h;
    }
    if let Some(dpi) = args.dpi {
        config.page.dpi = dpi;
    }
    if let Some(n) = args.workers {
        config.processing.max_workers = Some(n);
    }
    if let Some(n) = args.batch_size {
        config.processing.batch_size = n;
    }
    if args.no_hook {
        config.completion.command.clear();
    }
}

/// One run per directory argument; loose file arguments share a single run.
fn run_paths(
    config: &Config,
    paths: &[PathBuf],
    args: &RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = config.target_size();
    println!(
        "{}",
        output::format_target(&target, config.page.width_in, config.page.height_in)
    );

    let (dirs, files): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| p.is_dir());
    let mut results = Vec::new();

    for dir in dirs {
        let root = std::path::absolute(dir)?;
        println!("==> {}", root.display());
        let handle = run::start(&root, target, config.scheduler_options(), hook(config))?;
        let result = handle.wait_with_progress(|p| println!("{}", output::format_progress(p)))?;
        output::print_run_summary(&result, Some(&root));
        results.push(result);
    }

    if !files.is_empty() {
        println!("==> {} file(s)", files.len());
        let files = files
            .into_iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?;
        let handle = run::start_files(files, target, config.scheduler_options(), hook(config))?;
        let result = handle.wait_with_progress(|p| println!("{}", output::format_progress(p)))?;
        output::print_run_summary(&result, None);
        results.push(result);
    }

    if let Some(report) = &args.report {
        let json = if let [single] = results.as_slice() {
            serde_json::to_string_pretty(single)?
        } else {
            serde_json::to_string_pretty(&results)?
        };
        std::fs::write(report, json)?;
        println!("Report written to {}", report.display());
    }

    Ok(())
}

fn hook(config: &Config) -> Option<Box<dyn CompletionHook>> {
    config
        .completion_hook()
        .map(|h| Box::new(h) as Box<dyn CompletionHook>)
}
