pub mod plan;
pub mod protocol;
pub mod runner;
pub mod timing;

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

pub use self::plan::JobPlan;
pub use self::runner::JobOutcome;
pub use self::timing::JobTimings;
use crate::compare::DiffResult;
use crate::compare::diff::{self, DiffOptions};
use crate::store::{self, LoadError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("diff of {} vs {} panicked", baseline.display(), candidate.display())]
    Panicked {
        baseline: PathBuf,
        candidate: PathBuf,
    },

    #[error("failed to encode diff image {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write diff image {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One comparison request.
#[derive(Debug, Clone)]
pub struct DiffJob {
    pub baseline: PathBuf,
    pub candidate: PathBuf,
    /// Where the triptych goes when the images differ.
    pub output: PathBuf,
    pub threshold: f64,
}

/// A diff image write in flight.
///
/// Dropping it detaches the write; `wait` makes it durable and reports
/// encode/write failures.
pub struct PendingWrite {
    path: PathBuf,
    handle: JoinHandle<Result<(), JobError>>,
}

impl PendingWrite {
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub async fn wait(self) -> Result<(), JobError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(JobError::Write {
                path: self.path,
                source: Box::new(e),
            }),
        }
    }
}

/// A finished comparison. The diff image may still be writing.
pub struct JobOutput {
    pub result: DiffResult,
    pub write: Option<PendingWrite>,
    pub timings: JobTimings,
}

impl JobOutput {
    /// Wait for the diff image (if any) and record how long that took.
    pub async fn finish(&mut self) -> Result<(), JobError> {
        let Some(write) = self.write.take() else {
            return Ok(());
        };
        let t = Instant::now();
        let res = write.wait().await;
        self.timings.write = t.elapsed();
        self.timings.total += self.timings.write;
        res
    }
}

fn spawn_write(outcome: diff::DiffOutcome, path: PathBuf) -> PendingWrite {
    let target = path.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let bytes = store::encode(outcome.canvas, &target).map_err(|source| JobError::Encode {
            path: target.clone(),
            source,
        })?;
        store::write_file(&target, &bytes).map_err(|e| JobError::Write {
            path: target.clone(),
            source: e.into(),
        })?;
        debug!(path = %target.display(), bytes = bytes.len(), "diff image written");
        Ok(())
    });
    PendingWrite { path, handle }
}

/// Load both images concurrently, diff them, and start writing the diff
/// image when they differ.
///
/// Returns `Ok(None)` when neither image exists. The returned result does not
/// wait for the diff image write; see [`JobOutput::finish`].
pub async fn run(job: &DiffJob, options: &DiffOptions) -> Result<Option<JobOutput>, JobError> {
    let t0 = Instant::now();
    let (baseline, candidate) =
        tokio::try_join!(store::load(&job.baseline), store::load(&job.candidate))?;
    let t1 = Instant::now();

    let options = options.with_threshold(job.threshold);
    let outcome = tokio::task::spawn_blocking(move || diff::diff(&baseline, &candidate, &options))
        .await
        .map_err(|_| JobError::Panicked {
            baseline: job.baseline.clone(),
            candidate: job.candidate.clone(),
        })?;
    let t2 = Instant::now();

    let Some(outcome) = outcome else {
        debug!("neither image exists");
        return Ok(None);
    };
    let result = outcome.result;
    debug!(
        mismatched = result.mismatched_pixels,
        hash = result.diff_hash,
        diff_ms = (t2 - t1).as_millis() as u64,
        "compared"
    );

    let write = (result.mismatched_pixels != 0).then(|| spawn_write(outcome, job.output.clone()));

    Ok(Some(JobOutput {
        result,
        write,
        timings: JobTimings {
            load: t1 - t0,
            diff: t2 - t1,
            write: Default::default(),
            total: t2 - t0,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{MISSING_BASELINE, MISSING_CANDIDATE};
    use image::{Rgba, RgbaImage};
    use std::path::Path;

    fn write_png(path: &Path, w: u32, h: u32, color: Rgba<u8>) {
        RgbaImage::from_pixel(w, h, color).save(path).unwrap();
    }

    fn job(dir: &Path) -> DiffJob {
        DiffJob {
            baseline: dir.join("baseline.png"),
            candidate: dir.join("candidate.png"),
            output: dir.join("out/diff.png"),
            threshold: 0.03,
        }
    }

    #[tokio::test]
    async fn identical_images_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        write_png(&job.baseline, 4, 4, Rgba([0, 0, 0, 255]));
        write_png(&job.candidate, 4, 4, Rgba([0, 0, 0, 255]));

        let mut out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert!(out.result.is_match());
        assert_eq!(out.result.diff_hash, 0);
        assert!(out.write.is_none());
        out.finish().await.unwrap();
        assert!(!job.output.exists());
    }

    #[tokio::test]
    async fn black_vs_white_writes_triptych() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        write_png(&job.baseline, 4, 4, Rgba([0, 0, 0, 255]));
        write_png(&job.candidate, 4, 4, Rgba([255, 255, 255, 255]));

        let mut out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert_eq!(out.result.mismatched_pixels, 16);
        assert_ne!(out.result.diff_hash, 0);
        out.finish().await.unwrap();

        let written = image::open(&job.output).unwrap();
        assert_eq!((written.width(), written.height()), (12, 4));
    }

    #[tokio::test]
    async fn sentinels_and_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        assert!(run(&job, &DiffOptions::default()).await.unwrap().is_none());
        assert!(!job.output.exists());

        write_png(&job.candidate, 2, 2, Rgba([0, 0, 0, 255]));
        let mut out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert_eq!(out.result.mismatched_pixels, MISSING_BASELINE);
        out.finish().await.unwrap();
        assert!(job.output.exists());

        std::fs::remove_file(&job.candidate).unwrap();
        write_png(&job.baseline, 2, 2, Rgba([0, 0, 0, 255]));
        let out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert_eq!(out.result.mismatched_pixels, MISSING_CANDIDATE);
    }

    #[tokio::test]
    async fn job_threshold_overrides_options() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path());
        write_png(&job.baseline, 2, 2, Rgba([100, 100, 100, 255]));
        write_png(&job.candidate, 2, 2, Rgba([120, 120, 120, 255]));

        job.threshold = 0.5;
        let out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert!(out.result.is_match());

        job.threshold = 0.01;
        let out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert_eq!(out.result.mismatched_pixels, 4);
    }

    #[tokio::test]
    async fn decode_failure_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        std::fs::write(&job.baseline, b"garbage").unwrap();
        write_png(&job.candidate, 2, 2, Rgba([0, 0, 0, 255]));

        let err = run(&job, &DiffOptions::default()).await.err().unwrap();
        assert!(matches!(err, JobError::Load(LoadError::Decode { .. })));
        assert!(err.to_string().contains("baseline.png"));
    }

    #[tokio::test]
    async fn write_failure_keeps_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path());
        write_png(&job.baseline, 2, 2, Rgba([0, 0, 0, 255]));
        write_png(&job.candidate, 2, 2, Rgba([255, 255, 255, 255]));
        // A regular file where the output directory should be.
        std::fs::write(dir.path().join("blocked"), b"").unwrap();
        job.output = dir.path().join("blocked/diff.png");

        let mut out = run(&job, &DiffOptions::default()).await.unwrap().unwrap();
        assert_eq!(out.result.mismatched_pixels, 4);
        let err = out.finish().await.unwrap_err();
        assert!(matches!(err, JobError::Write { .. }));
        assert_eq!(out.result.mismatched_pixels, 4);
    }
}
