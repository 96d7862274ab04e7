//! CLI parse: clap types for ddxgen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ddxgen - resumable differential diagnosis generation over case datasets
#[derive(Parser)]
#[command(name = "ddxgen")]
#[command(about = "Generate structured differential diagnoses for a CSV of cases, resumably")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the user config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate diagnoses for every case not yet in the checkpoint, then write merged output
    Generate {
        /// Provider to use (openai, deepseek, gemini)
        #[arg(long)]
        provider: String,
        /// Input CSV of cases
        #[arg(long)]
        input: PathBuf,
        /// Merged output CSV
        #[arg(long)]
        output: PathBuf,
        /// Checkpoint CSV; reuse it to resume an interrupted run
        #[arg(long)]
        temp_output: PathBuf,
        /// Input column holding the case text [default: case_description]
        #[arg(long)]
        column: Option<String>,
        /// Attempts per case before giving up
        #[arg(long)]
        max_retries: Option<u32>,
        /// Backoff unit in milliseconds; attempt n waits unit * 2^n
        #[arg(long)]
        retry_base_delay_ms: Option<u64>,
    },
    /// List available providers
    Providers {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
