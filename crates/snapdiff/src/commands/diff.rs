use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::ResolvedRunConfig;
use crate::job::protocol::JobResponse;
use crate::job::{self, DiffJob};
use crate::report::terminal;

/// `snapdiff diff`: compare one pair.
/// Returns exit code: 0 = match, 1 = mismatch or one image missing,
/// 2 = neither image exists.
pub async fn diff(
    config: ResolvedRunConfig,
    baseline: &Path,
    candidate: &Path,
    output: &Path,
    json: bool,
) -> Result<i32> {
    let job = DiffJob {
        baseline: baseline.to_path_buf(),
        candidate: candidate.to_path_buf(),
        output: output.to_path_buf(),
        threshold: config.options.threshold,
    };

    let t0 = Instant::now();
    let outcome = job::run(&job, &config.options).await.with_context(|| {
        format!(
            "Failed to diff {} vs {}",
            baseline.display(),
            candidate.display()
        )
    })?;

    let Some(mut out) = outcome else {
        if json {
            println!("{}", serde_json::to_string(&JobResponse::default())?);
        } else {
            println!(
                "Neither {} nor {} exists, nothing to compare.",
                baseline.display(),
                candidate.display()
            );
        }
        return Ok(2);
    };

    // The result is ready before the diff image is on disk.
    let result = out.result;
    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        let name = candidate.display().to_string();
        terminal::print_line(&name, &result.status(), t0.elapsed());
    }

    if let Some(write) = &out.write {
        debug!(path = %write.path().display(), "waiting for diff image");
    }
    out.finish().await.context("Diff image was not saved")?;
    if !json && !result.is_match() {
        println!("  Diff image: {}", output.display());
    }

    Ok(if result.is_match() { 0 } else { 1 })
}
