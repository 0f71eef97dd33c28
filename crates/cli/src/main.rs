//! Iris species predictor CLI
//!
//! Trains the random forest on the embedded dataset, and classifies single
//! measurements or CSV batches against a saved model artifact.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{batch, model, predict, train};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Iris species predictor
#[derive(Parser)]
#[command(name = "iris")]
#[command(
    author,
    version,
    about = "Iris species predictor: train, inspect and query a random forest",
    long_about = None
)]
pub struct Cli {
    /// Model artifact path (can also be set via IRIS_MODEL_PATH env var)
    #[arg(long, short, global = true, env = "IRIS_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Output format (defaults to the config file setting, then table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on the embedded iris dataset and save it
    Train {
        /// Where to write the artifact (defaults to the model path)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Number of trees
        #[arg(long, default_value_t = iris_core::forest::DEFAULT_N_ESTIMATORS)]
        trees: usize,

        /// Seed for bootstrap sampling and feature selection
        #[arg(long, default_value_t = iris_core::forest::DEFAULT_SEED)]
        seed: u64,

        /// Maximum tree depth (unlimited if not specified)
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Predict the species for one flower
    Predict {
        /// Sepal length, sepal width, petal length and petal width in cm
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<String>,

        /// Also write the measurements and predicted species to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Predict species for every row of a CSV file
    Batch {
        /// CSV with a header row and four measurement columns
        #[arg(long, short)]
        input: PathBuf,

        /// Write predictions to this CSV file instead of printing them
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show feature importance of the model
    Importance,

    /// Show model metadata
    Info,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load()?;
    let model_path = config.model_path(cli.model.clone());
    let format = cli.format.unwrap_or_else(|| config.output_format());
    let presentation = &config.presentation;

    match cli.command {
        Commands::Train {
            output,
            trees,
            seed,
            max_depth,
        } => {
            let options = train::TrainOptions {
                output: output.unwrap_or(model_path),
                trees,
                seed,
                max_depth,
            };
            train::run(&options, format, presentation)?;
        }
        Commands::Predict { values, export } => {
            predict::run(&model_path, &values, export.as_deref(), format, presentation)?;
        }
        Commands::Batch { input, output } => {
            batch::run(&model_path, &input, output.as_deref(), format, presentation)?;
        }
        Commands::Importance => {
            model::show_importance(&model_path, format, presentation)?;
        }
        Commands::Info => {
            model::show_info(&model_path, format)?;
        }
    }

    Ok(())
}
