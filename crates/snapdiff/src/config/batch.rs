use serde::{Deserialize, Serialize};

/// Default number of concurrent diff workers.
const DEFAULT_PARALLEL: usize = 4;

/// Configuration for batch runs.
///
/// Fields are `Option`: `None` means "use default".
/// Serves both TOML deserialization (`[batch]`) and CLI argument parsing.
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of image pairs diffed concurrently
    #[arg(long, short = 'p')]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
}

impl BatchConfig {
    /// Overlay non-None fields from `other` onto self.
    pub fn merge(&mut self, other: &BatchConfig) {
        if other.parallel.is_some() {
            self.parallel = other.parallel;
        }
    }

    pub fn parallel(&self) -> usize {
        self.parallel.unwrap_or(DEFAULT_PARALLEL).max(1)
    }
}
