use std::time::Duration;

/// Per-stage timing breakdown for a single pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTimings {
    /// Reading and decoding both images (concurrently).
    pub load: Duration,
    pub diff: Duration,
    /// Encoding and writing the diff image. Zero when nothing was written.
    pub write: Duration,
    pub total: Duration,
}
