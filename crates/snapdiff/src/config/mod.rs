pub mod batch;
pub mod resolve;
pub mod template;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use self::batch::BatchConfig;
pub use self::resolve::{CliOverrides, ResolvedRunConfig};
pub use self::template::{config_file_exists, write_template};
use crate::compare::diff::DEFAULT_THRESHOLD;

pub(crate) const CONFIG_DIR: &str = ".snapdiff";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Tolerated brightness difference per pixel (0.0-1.0, fraction of 255).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// RGBA color marking mismatched pixels in the diff panel.
    #[serde(default = "default_highlight")]
    pub highlight: [u8; 4],
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_highlight() -> [u8; 4] {
    [255, 0, 255, 255]
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            highlight: default_highlight(),
        }
    }
}

pub fn validate_threshold(v: f64) -> Result<f64, String> {
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("threshold must be between 0.0 and 1.0, got {v}"));
    }
    Ok(v)
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Load `<dir>/config.toml`. A missing file yields the defaults.
pub fn load_from(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    validate_threshold(config.diff.threshold).map_err(|e| anyhow::anyhow!("diff.{e}"))?;
    Ok(config)
}

pub fn load() -> Result<Config> {
    load_from(Path::new(CONFIG_DIR))
}
