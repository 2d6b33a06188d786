mod cli;
mod commands;
mod compare;
mod config;
mod job;
mod report;
mod store;

use clap::Parser;
use config::{BatchConfig, CliOverrides, ResolvedRunConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snapdiff=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Init { force } => {
            commands::init(force)?;
        }
        cli::Command::Diff {
            baseline,
            candidate,
            output,
            threshold,
            json,
        } => {
            let config = ResolvedRunConfig::new(CliOverrides {
                threshold,
                batch: BatchConfig::default(),
            })?;
            let code = commands::diff(config, &baseline, &candidate, &output, json).await?;
            std::process::exit(code);
        }
        cli::Command::Batch {
            baseline_dir,
            candidate_dir,
            output_dir,
            filter,
            threshold,
            timings,
            batch,
        } => {
            let config = ResolvedRunConfig::new(CliOverrides { threshold, batch })?;
            let dirs = commands::BatchDirs {
                baseline: &baseline_dir,
                candidate: &candidate_dir,
                output: &output_dir,
            };
            let code = commands::batch(config, dirs, filter.as_deref(), timings).await?;
            std::process::exit(code);
        }
        cli::Command::Worker { threshold } => {
            let config = ResolvedRunConfig::new(CliOverrides {
                threshold,
                batch: BatchConfig::default(),
            })?;
            commands::worker(config).await?;
        }
    }

    Ok(())
}
