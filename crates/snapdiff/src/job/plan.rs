use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;

use super::DiffJob;
use super::runner::{JobOutcome, run_all};
use crate::compare::diff::DiffOptions;
use crate::store;

/// Normalize a string for filter comparison: lowercase + treat `_` and ` ` as equivalent.
pub(crate) fn normalize_for_filter(s: &str) -> String {
    s.to_lowercase().replace('_', " ")
}

/// Absolute form of `path` with symlinks resolved as far as it exists.
fn resolve(path: &Path) -> Result<PathBuf> {
    let abs =
        std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))?;
    let mut existing = abs.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Diff images share the inputs' relative paths and extensions, so the
/// output directory must not overlap either input directory.
fn check_output_dir(output_dir: &Path, inputs: [&Path; 2]) -> Result<()> {
    let output = resolve(output_dir)?;
    for input in inputs {
        let input_abs = resolve(input)?;
        if output.starts_with(&input_abs) || input_abs.starts_with(&output) {
            bail!(
                "Output directory {} overlaps input directory {}",
                output_dir.display(),
                input.display()
            );
        }
    }
    Ok(())
}

/// A diff job tagged with the relative path it was planned from.
#[derive(Debug, Clone)]
pub struct PairJob {
    /// Relative image path shared by both directories, e.g. `forms/button.png`.
    pub id: String,
    pub job: DiffJob,
}

impl PairJob {
    /// Case-insensitive substring match on the ID, spaces and underscores equal.
    pub fn matches_filter(&self, pattern: &str) -> bool {
        normalize_for_filter(&self.id).contains(&normalize_for_filter(pattern))
    }
}

/// Plans and executes a batch run: pairing, filtering, diffing.
pub struct JobPlan {
    jobs: Vec<PairJob>,
}

impl JobPlan {
    /// Pair every image found under either directory by relative path.
    /// Diff images land under `output_dir` at the same relative path.
    pub fn plan(
        baseline_dir: &Path,
        candidate_dir: &Path,
        output_dir: &Path,
        threshold: f64,
        filter: Option<&str>,
    ) -> Result<Self> {
        check_output_dir(output_dir, [baseline_dir, candidate_dir])?;

        let mut ids: BTreeSet<String> = store::list_image_ids(baseline_dir)?;
        ids.extend(store::list_image_ids(candidate_dir)?);

        let mut jobs: Vec<PairJob> = ids
            .into_iter()
            .map(|id| PairJob {
                job: DiffJob {
                    baseline: baseline_dir.join(&id),
                    candidate: candidate_dir.join(&id),
                    output: output_dir.join(&id),
                    threshold,
                },
                id,
            })
            .collect();

        if let Some(pattern) = filter {
            jobs.retain(|job| job.matches_filter(pattern));
        }

        Ok(Self { jobs })
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.jobs.iter().map(|j| j.job.output.clone()).collect()
    }

    /// Start the worker pool. Consumes self.
    pub fn execute(
        self,
        parallel: usize,
        options: DiffOptions,
    ) -> mpsc::Receiver<(PairJob, JobOutcome)> {
        run_all(self.jobs, parallel, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(plan: &JobPlan) -> Vec<&str> {
        plan.jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn pairs_union_of_both_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        let cand = dir.path().join("cand");
        std::fs::create_dir_all(base.join("forms")).unwrap();
        std::fs::create_dir_all(&cand).unwrap();
        std::fs::write(base.join("forms/Text_Input.png"), b"").unwrap();
        std::fs::write(base.join("shared.png"), b"").unwrap();
        std::fs::write(cand.join("shared.png"), b"").unwrap();
        std::fs::write(cand.join("added.png"), b"").unwrap();

        let out = dir.path().join("out");
        let plan = JobPlan::plan(&base, &cand, &out, 0.05, None).unwrap();
        assert_eq!(
            ids(&plan),
            vec!["added.png", "forms/Text_Input.png", "shared.png"]
        );
        assert_eq!(plan.output_paths()[1], out.join("forms/Text_Input.png"));
        assert!(plan.jobs.iter().all(|j| j.job.threshold == 0.05));

        let plan = JobPlan::plan(&base, &cand, &out, 0.05, Some("text input")).unwrap();
        assert_eq!(ids(&plan), vec!["forms/Text_Input.png"]);
    }

    #[test]
    fn output_dir_must_not_overlap_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        let cand = dir.path().join("cand");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::create_dir_all(&cand).unwrap();
        std::fs::write(cand.join("a.png"), b"").unwrap();

        let err = JobPlan::plan(&base, &cand, &cand, 0.03, None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("overlaps"));
        assert!(cand.join("a.png").exists());

        // Nested, not yet created, and spelled with a `.` component.
        let nested = dir.path().join("./base/diffs/run1");
        assert!(JobPlan::plan(&base, &cand, &nested, 0.03, None).is_err());

        // An output dir containing an input is rejected too.
        assert!(JobPlan::plan(&base, &cand, dir.path(), 0.03, None).is_err());

        let sibling = dir.path().join("out");
        assert!(JobPlan::plan(&base, &cand, &sibling, 0.03, None).is_ok());
    }
}
