pub mod buffer;
pub mod diff;
pub mod hash;
pub mod overlay;

use serde::{Deserialize, Serialize};

/// `mismatched_pixels` value when the baseline image does not exist.
pub const MISSING_BASELINE: i64 = -1;
/// `mismatched_pixels` value when the candidate image does not exist.
pub const MISSING_CANDIDATE: i64 = -2;

/// Numeric summary of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Mismatch count, or one of the `MISSING_*` sentinels.
    pub mismatched_pixels: i64,
    /// Positional hash of the mismatches; 0 when there are none.
    pub diff_hash: u64,
}

impl DiffResult {
    pub fn is_match(&self) -> bool {
        self.mismatched_pixels == 0
    }

    pub fn status(&self) -> SnapshotStatus {
        match self.mismatched_pixels {
            0 => SnapshotStatus::Pass,
            MISSING_BASELINE => SnapshotStatus::New,
            MISSING_CANDIDATE => SnapshotStatus::Gone,
            n => SnapshotStatus::Fail {
                mismatched_pixels: n.unsigned_abs(),
                diff_hash: self.diff_hash,
            },
        }
    }
}

/// Status of a single pair comparison.
pub enum SnapshotStatus {
    Pass,
    Fail { mismatched_pixels: u64, diff_hash: u64 },
    /// Only the candidate exists.
    New,
    /// Only the baseline exists.
    Gone,
    Error(String),
}
