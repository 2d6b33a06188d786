use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, debug_span, info_span, warn};

use super::plan::PairJob;
use super::timing::JobTimings;
use super::{JobOutput, run};
use crate::compare::DiffResult;
use crate::compare::diff::DiffOptions;

/// Per-pair outcome.
pub enum JobOutcome {
    Ok(DiffResult, JobTimings),
    /// Compared fine, but the diff image could not be written.
    WriteFailed(DiffResult, String),
    /// Neither image exists.
    Empty,
    Err(String),
}

async fn execute(pair: &PairJob, options: &DiffOptions) -> JobOutcome {
    let output = match run(&pair.job, options).await {
        Ok(Some(output)) => output,
        Ok(None) => return JobOutcome::Empty,
        Err(e) => {
            let msg = format!("{:#}", anyhow::Error::from(e));
            warn!(error = %msg, "job failed");
            return JobOutcome::Err(msg);
        }
    };
    finish(output).await
}

/// Batch runs need the diff image on disk before reporting, so wait for it.
async fn finish(mut output: JobOutput) -> JobOutcome {
    match output.finish().await {
        Ok(()) => JobOutcome::Ok(output.result, output.timings),
        Err(e) => {
            let msg = format!("{:#}", anyhow::Error::from(e));
            warn!(error = %msg, "diff image write failed");
            JobOutcome::WriteFailed(output.result, msg)
        }
    }
}

/// Run every job on a pool of `parallel` workers sharing one queue.
///
/// Failures are reported per pair rather than aborting the run.
///
/// Returns a `Receiver` immediately; results stream in as jobs complete.
pub fn run_all(
    jobs: Vec<PairJob>,
    parallel: usize,
    options: DiffOptions,
) -> mpsc::Receiver<(PairJob, JobOutcome)> {
    let job_count = jobs.len();
    let worker_count = job_count.min(parallel.max(1));
    debug!(
        jobs = job_count,
        workers = worker_count,
        parallel,
        "starting diff run"
    );

    let queue = Arc::new(Mutex::new(jobs));
    let (tx, rx) = mpsc::channel(parallel.max(1) * 2);

    // One task per worker, each pulling from the shared queue.
    let mut set = tokio::task::JoinSet::new();
    for idx in 0..worker_count {
        let queue = queue.clone();
        let tx = tx.clone();
        let span = info_span!("worker", id = idx);
        set.spawn(
            async move {
                debug!("started");
                loop {
                    let (pair, remaining) = {
                        let mut q = queue.lock().await;
                        match q.pop() {
                            Some(p) => {
                                let remaining = q.len();
                                (p, remaining)
                            }
                            None => {
                                debug!("queue empty, exiting");
                                break;
                            }
                        }
                    };
                    debug!(job = %pair.id, remaining, "picked job");

                    let job_span = debug_span!("job", job = %pair.id);
                    let outcome = execute(&pair, &options).instrument(job_span).await;

                    if tx.send((pair, outcome)).await.is_err() {
                        warn!("channel send failed (receiver dropped), stopping");
                        break;
                    }
                }
                debug!("exiting");
            }
            .instrument(span),
        );
    }

    // Channel closes once every worker's sender is dropped.
    drop(tx);

    tokio::spawn(async move {
        while let Some(result) = set.join_next().await {
            match result {
                Ok(()) => debug!("worker task joined"),
                Err(e) => warn!(error = %e, "worker task panicked"),
            }
        }
        debug!("all workers done");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DiffJob;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn every_job_reports_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut jobs = Vec::new();
        for i in 0..7u8 {
            let baseline = root.join(format!("base-{i}.png"));
            let candidate = root.join(format!("cand-{i}.png"));
            RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]))
                .save(&baseline)
                .unwrap();
            RgbaImage::from_pixel(3, 3, Rgba([i * 30, 0, 0, 255]))
                .save(&candidate)
                .unwrap();
            jobs.push(PairJob {
                id: format!("pair-{i}"),
                job: DiffJob {
                    baseline,
                    candidate,
                    output: root.join(format!("out/diff-{i}.png")),
                    threshold: 0.03,
                },
            });
        }
        // One pair with an undecodable baseline must not stop the others.
        std::fs::write(root.join("base-3.png"), b"junk").unwrap();

        let mut rx = run_all(jobs, 3, DiffOptions::default());
        let mut seen = Vec::new();
        while let Some((pair, outcome)) = rx.recv().await {
            let kind = match outcome {
                JobOutcome::Ok(result, _) if result.is_match() => "pass",
                JobOutcome::Ok(..) => "fail",
                JobOutcome::WriteFailed(..) => "write",
                JobOutcome::Empty => "empty",
                JobOutcome::Err(_) => "err",
            };
            seen.push((pair.id, kind));
        }
        seen.sort();
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[0], ("pair-0".to_string(), "pass"));
        assert_eq!(seen[3], ("pair-3".to_string(), "err"));
        assert_eq!(seen[6], ("pair-6".to_string(), "fail"));
        assert!(root.join("out/diff-6.png").exists());
        assert!(!root.join("out/diff-0.png").exists());
    }
}
