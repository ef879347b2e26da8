//! ritlens CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "ritlens",
    version,
    about = "Assessment export parser and analytics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How `ingest` prints its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse export files and merge their records into the store
    Ingest {
        /// Export files (CSV) to ingest
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Record store directory (defaults to `store_dir` from config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Summary format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check an export file without storing anything
    Validate {
        /// Export file (CSV) to check
        #[arg(long)]
        input: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute the dashboard for one term and grade
    Report {
        /// Record store directory (defaults to `store_dir` from config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Term label, e.g. "Spring 2025-2026"
        #[arg(long)]
        term: String,

        /// Grade (0 for kindergarten)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=12))]
        grade: u8,

        /// Earlier term for the benchmark transition matrix
        #[arg(long)]
        from: Option<String>,

        /// Student id prefix of a cohort to track
        #[arg(long)]
        cohort: Option<String>,

        /// Save the full report as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and sample norm table
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "ritlens=info"
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest {
            input,
            store,
            format,
            config,
        } => commands::ingest::execute(input, store, format, config).await,
        Commands::Validate { input, config } => commands::validate::execute(input, config),
        Commands::Report {
            store,
            term,
            grade,
            from,
            cohort,
            output,
            config,
        } => commands::report::execute(store, term, grade, from, cohort, output, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
