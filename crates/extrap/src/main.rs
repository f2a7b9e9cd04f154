use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use extrap_modeler::{FailurePolicy, ModelerOptions, Strategy};
use itertools::Itertools;
use mimalloc::MiMalloc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

// Model search allocates many small design matrices per call path.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Fit empirical performance models to repeated measurements of a program
/// taken at several values of a scaling parameter.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the best model for every call path and metric
    ///
    /// Reads a JSON sample set (raw repetitions per call path, metric and
    /// coordinate) and writes a JSON report with one model per call path and
    /// metric.
    Model {
        /// Input sample set (reads from stdin if not specified)
        input: Option<String>,

        /// Output file path (writes to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,

        /// JSON file with modeler options; flags below override it
        #[arg(long)]
        options: Option<String>,

        /// Fit against medians instead of means
        #[arg(long)]
        median: bool,

        /// Minimum number of distinct configurations per fit
        #[arg(long, value_name = "N")]
        min_points: Option<usize>,

        /// Coordinate component to model
        #[arg(long, value_name = "INDEX")]
        parameter: Option<usize>,

        /// Compose runtime models from hardware-counter models
        #[arg(long)]
        hardware_counters: bool,

        /// Record failed fits in the report instead of aborting
        #[arg(long)]
        skip_failures: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging. Output goes to stderr so JSON output
    // on stdout remains clean for piping. Default to warn, allowlist our crates.
    const CRATES: &[&str] = &[
        "extrap",
        "extrap_modeler",
        "extrap_entities",
        "extrap_regression",
    ];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .init();

    match cli.command {
        Commands::Model {
            input,
            output,
            options,
            median,
            min_points,
            parameter,
            hardware_counters,
            skip_failures,
        } => {
            let mut modeler_options = match options {
                Some(path) => load_options(&path)?,
                None => ModelerOptions::default(),
            };
            if median {
                modeler_options.use_median = true;
            }
            if let Some(n) = min_points {
                modeler_options.min_measurement_points = n;
            }
            if let Some(index) = parameter {
                modeler_options.parameter_index = index;
            }
            if skip_failures {
                modeler_options.failure_policy = FailurePolicy::Skip;
            }
            let strategy = if hardware_counters {
                Strategy::HardwareCounters
            } else {
                Strategy::Independent
            };
            debug!(?modeler_options, ?strategy, "resolved options");

            // Lock stdin/stdout once up front rather than on each call.
            let stdin = std::io::stdin();
            let reader: Box<dyn Read> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(&path)
                        .with_context(|| format!("failed to open {path}"))?,
                )),
                None => Box::new(stdin.lock()),
            };
            let stdout = std::io::stdout();
            let mut writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(&path)
                        .with_context(|| format!("failed to create {path}"))?,
                )),
                None => Box::new(stdout.lock()),
            };
            extrap_modeler::run(
                reader,
                &mut *writer,
                &modeler_options,
                strategy,
            )?;
            writer.flush()?;
            Ok(())
        }
    }
}

/// Reads a partial [`ModelerOptions`] JSON file; missing fields default.
fn load_options(path: &str) -> Result<ModelerOptions> {
    let file =
        File::open(path).with_context(|| format!("failed to open {path}"))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid options file {path}"))
}
