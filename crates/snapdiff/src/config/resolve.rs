use anyhow::{Context, Result};

use super::batch::BatchConfig;
use super::{Config, load, validate_threshold};
use crate::compare::buffer::rgba;
use crate::compare::diff::DiffOptions;

/// Values extracted from the CLI that participate in the merge.
#[derive(Default)]
pub struct CliOverrides {
    pub threshold: Option<f64>,
    pub batch: BatchConfig,
}

/// Environment values that participate in the merge.
#[derive(Default)]
struct EnvOverrides {
    threshold: Option<f64>,
    parallel: Option<usize>,
}

impl EnvOverrides {
    fn read() -> Result<Self> {
        let threshold = std::env::var("SNAPDIFF_THRESHOLD")
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .context("SNAPDIFF_THRESHOLD must be a valid float")?;
        let parallel = std::env::var("SNAPDIFF_PARALLEL")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("SNAPDIFF_PARALLEL must be a positive integer")?;
        Ok(Self {
            threshold,
            parallel,
        })
    }
}

/// Fully resolved config after CLI > env > file > defaults merge.
#[derive(Debug)]
pub struct ResolvedRunConfig {
    pub options: DiffOptions,
    pub batch: BatchConfig,
}

impl ResolvedRunConfig {
    pub fn new(cli: CliOverrides) -> Result<Self> {
        // 1. File layer
        let file_config = load()?;

        // 2. Env layer
        let env = EnvOverrides::read()?;

        Self::merge(cli, env, file_config)
    }

    fn merge(cli: CliOverrides, env: EnvOverrides, file_config: Config) -> Result<Self> {
        // 3. CLI > env > file (highest priority first)
        let threshold = cli
            .threshold
            .or(env.threshold)
            .unwrap_or(file_config.diff.threshold);
        validate_threshold(threshold).map_err(|e| anyhow::anyhow!("{e}"))?;

        // 4. Merge batch: file base, env, then CLI overlay
        let mut batch = file_config.batch;
        batch.merge(&BatchConfig {
            parallel: env.parallel,
        });
        batch.merge(&cli.batch);

        let [r, g, b, a] = file_config.diff.highlight;
        let options = DiffOptions {
            threshold,
            highlight: rgba(r, g, b, a),
            ..DiffOptions::default()
        };

        Ok(Self { options, batch })
    }
}
