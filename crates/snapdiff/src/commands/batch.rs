use std::path::Path;
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::debug;

use crate::compare::SnapshotStatus;
use crate::config::ResolvedRunConfig;
use crate::job::{JobOutcome, JobPlan, JobTimings};
use crate::report::terminal::{self, Tally};
use crate::store;

/// Directories of one batch run.
pub struct BatchDirs<'a> {
    pub baseline: &'a Path,
    pub candidate: &'a Path,
    pub output: &'a Path,
}

/// `snapdiff batch`: pair, diff, report.
/// Returns exit code: 0 = all pass, 1 = any fail, new, gone or error.
pub async fn batch(
    config: ResolvedRunConfig,
    dirs: BatchDirs<'_>,
    filter: Option<&str>,
    timings: bool,
) -> Result<i32> {
    let plan = JobPlan::plan(
        dirs.baseline,
        dirs.candidate,
        dirs.output,
        config.options.threshold,
        filter,
    )?;
    if plan.total() == 0 {
        if filter.is_some() {
            println!("No image pairs match filter");
        } else {
            println!(
                "No images found in {} or {}",
                dirs.baseline.display(),
                dirs.candidate.display()
            );
        }
        return Ok(0);
    }

    println!(
        "Comparing {} image pair(s) with {} worker(s)",
        plan.total(),
        config.batch.parallel()
    );
    println!();

    // Diff images are only written on mismatch, so drop stale ones first.
    let outputs = plan.output_paths();
    let stuck = store::clean_outputs(outputs.iter().map(|p| p.as_path()));
    if let Some(first) = stuck.first() {
        bail!(
            "Could not remove {} stale diff image(s), e.g. {}",
            stuck.len(),
            first.display()
        );
    }

    let run_start = Instant::now();
    let total = plan.total();
    let mut rx = plan.execute(config.batch.parallel(), config.options);

    let mut done = 0usize;
    let mut tally = Tally::default();
    let mut all_timings: Vec<(String, JobTimings)> = Vec::new();

    let mut failed_names: Vec<String> = Vec::new();
    let mut new_names: Vec<String> = Vec::new();
    let mut gone_names: Vec<String> = Vec::new();
    let mut errored_names: Vec<String> = Vec::new();

    debug!(total, "waiting for diff results");
    while let Some((pair, outcome)) = rx.recv().await {
        done += 1;
        let name = pair.id;
        debug!(done, total, name = %name, "received result");

        let (status, job_timings) = match outcome {
            JobOutcome::Ok(result, t) => (result.status(), t),
            JobOutcome::WriteFailed(result, msg) => (
                SnapshotStatus::Error(format!("{} pixels, {msg}", result.mismatched_pixels)),
                JobTimings::default(),
            ),
            JobOutcome::Empty => {
                // Listed but gone by the time it was loaded.
                terminal::print_error_line(&name, "both images disappeared");
                tally.errored += 1;
                errored_names.push(name);
                terminal::show_progress(done, total);
                continue;
            }
            JobOutcome::Err(msg) => {
                terminal::print_error_line(&name, &msg);
                tally.errored += 1;
                errored_names.push(name);
                terminal::show_progress(done, total);
                continue;
            }
        };

        match &status {
            SnapshotStatus::Pass => tally.passed += 1,
            SnapshotStatus::Fail { .. } => {
                tally.failed += 1;
                failed_names.push(name.clone());
            }
            SnapshotStatus::New => {
                tally.new += 1;
                new_names.push(name.clone());
            }
            SnapshotStatus::Gone => {
                tally.gone += 1;
                gone_names.push(name.clone());
            }
            SnapshotStatus::Error(_) => {
                tally.errored += 1;
                errored_names.push(name.clone());
            }
        }

        terminal::print_line(&name, &status, job_timings.total);
        all_timings.push((name, job_timings));
        terminal::show_progress(done, total);
    }

    if timings {
        terminal::print_timing_table(&all_timings);
    }

    failed_names.sort();
    new_names.sort();
    gone_names.sort();
    errored_names.sort();
    terminal::print_actionable_summary(&failed_names, &new_names, &gone_names, &errored_names);
    terminal::print_summary(&tally, dirs.output, run_start.elapsed());

    Ok(if tally.all_passed() { 0 } else { 1 })
}
