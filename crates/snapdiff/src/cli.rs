use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;
use crate::config::BatchConfig;

fn parse_threshold(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    config::validate_threshold(v)
}

#[derive(Parser)]
#[command(
    name = "snapdiff",
    about = "Pixel diffing of screenshot pairs for visual regression testing"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create .snapdiff/config.toml with default settings
    Init {
        /// Overwrite existing config
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Compare one baseline/candidate pair (exit 0 match, 1 differ, 2 nothing to compare)
    Diff {
        /// Baseline image
        baseline: PathBuf,
        /// Candidate image
        candidate: PathBuf,
        /// Where to write the diff image when the pair differs
        output: PathBuf,
        /// Tolerated brightness difference per pixel (0.0–1.0)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare every image under two directories, paired by relative path (exit 0/1)
    Batch {
        /// Directory of baseline images
        baseline_dir: PathBuf,
        /// Directory of candidate images
        candidate_dir: PathBuf,
        /// Directory receiving diff images
        output_dir: PathBuf,
        /// Only compare pairs whose path contains PATTERN (case-insensitive)
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// Tolerated brightness difference per pixel (0.0–1.0)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// Print per-pair timing breakdown table
        #[arg(long)]
        timings: bool,
        #[command(flatten)]
        batch: BatchConfig,
    },

    /// Serve JSON diff requests on stdin, one response line per request
    Worker {
        /// Threshold for requests that do not carry a valid one
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
    },
}
