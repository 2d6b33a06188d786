use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{DiffJob, run};
use crate::compare::DiffResult;
use crate::compare::diff::DiffOptions;

/// A diff request as received from a dispatcher, one JSON object per line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Opaque correlation value, echoed back in the response.
    #[serde(default)]
    pub id: Option<Value>,
    pub baseline_image_path: PathBuf,
    pub candidate_image_path: PathBuf,
    pub diff_image_path: PathBuf,
    /// Missing, non-numeric or non-finite values fall back to the default.
    #[serde(default, deserialize_with = "lenient_threshold")]
    pub threshold: Option<f64>,
}

fn lenient_threshold<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|t| t.is_finite()))
}

impl JobRequest {
    pub fn into_job(self, default_threshold: f64) -> DiffJob {
        DiffJob {
            baseline: self.baseline_image_path,
            candidate: self.candidate_image_path,
            output: self.diff_image_path,
            threshold: self.threshold.unwrap_or(default_threshold),
        }
    }
}

/// Reply to one request.
///
/// Empty (apart from `id`) when neither image existed. `result` and `error`
/// are both set when the comparison succeeded but the diff image could not be
/// written.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DiffResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResponse {
    pub fn error(id: Option<Value>, msg: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(msg),
        }
    }
}

/// Parse and run one request line. Never fails: problems become error
/// responses so the dispatcher can attribute them.
pub async fn handle_line(line: &str, options: &DiffOptions) -> JobResponse {
    let request: JobRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed request");
            return JobResponse::error(None, format!("malformed request: {e}"));
        }
    };
    let id = request.id.clone();
    let job = request.into_job(options.threshold);
    let pair = format!("{} vs {}", job.baseline.display(), job.candidate.display());

    match run(&job, options).await {
        Ok(None) => JobResponse {
            id,
            ..Default::default()
        },
        Ok(Some(mut output)) => {
            let error = output.finish().await.err().map(|e| {
                let msg = format!("{:#}", anyhow::Error::from(e));
                warn!(pair = %pair, error = %msg, "write failed");
                format!("{pair}: {msg}")
            });
            JobResponse {
                id,
                result: Some(output.result),
                error,
            }
        }
        Err(e) => {
            let msg = format!("{:#}", anyhow::Error::from(e));
            warn!(pair = %pair, error = %msg, "job failed");
            JobResponse::error(id, format!("{pair}: {msg}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn parse(v: Value) -> JobRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn threshold_is_lenient() {
        let base = json!({
            "baselineImagePath": "a.png",
            "candidateImagePath": "b.png",
            "diffImagePath": "d.png",
        });
        assert_eq!(parse(base.clone()).threshold, None);

        let mut v = base.clone();
        v["threshold"] = json!(0.1);
        assert_eq!(parse(v).threshold, Some(0.1));

        let mut v = base.clone();
        v["threshold"] = json!("high");
        assert_eq!(parse(v).threshold, None);

        let mut v = base;
        v["threshold"] = Value::Null;
        let job = parse(v).into_job(0.03);
        assert_eq!(job.threshold, 0.03);
        assert_eq!(job.output, PathBuf::from("d.png"));
    }

    #[test]
    fn empty_response_serializes_to_id_only() {
        let r = JobResponse {
            id: Some(json!(7)),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"id":7}"#);
    }

    #[tokio::test]
    async fn handles_a_request_line() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let d = dir.path().join("d.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))
            .save(&a)
            .unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]))
            .save(&b)
            .unwrap();

        let line = json!({
            "id": "job-1",
            "baselineImagePath": a,
            "candidateImagePath": b,
            "diffImagePath": d,
        })
        .to_string();
        let resp = handle_line(&line, &DiffOptions::default()).await;
        assert_eq!(resp.id, Some(json!("job-1")));
        assert_eq!(resp.error, None);
        assert_eq!(resp.result.unwrap().mismatched_pixels, 16);
        assert!(d.exists());
    }

    #[tokio::test]
    async fn write_failure_reports_result_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))
            .save(&a)
            .unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]))
            .save(&b)
            .unwrap();
        // A regular file where the output directory should be.
        std::fs::write(dir.path().join("blocked"), b"").unwrap();

        let line = json!({
            "id": 3,
            "baselineImagePath": a,
            "candidateImagePath": b,
            "diffImagePath": dir.path().join("blocked/d.png"),
        })
        .to_string();
        let resp = handle_line(&line, &DiffOptions::default()).await;
        assert_eq!(resp.id, Some(json!(3)));
        assert_eq!(resp.result.unwrap().mismatched_pixels, 4);
        let error = resp.error.unwrap();
        assert!(error.contains("a.png vs"));
        assert!(error.contains("failed to write diff image"));

        let v: Value = serde_json::to_value(JobResponse {
            id: None,
            result: resp.result,
            error: Some(error),
        })
        .unwrap();
        assert!(v.get("result").is_some() && v.get("error").is_some());
    }

    #[tokio::test]
    async fn missing_pair_gives_empty_response() {
        let dir = tempfile::tempdir().unwrap();
        let line = json!({
            "baselineImagePath": dir.path().join("a.png"),
            "candidateImagePath": dir.path().join("b.png"),
            "diffImagePath": dir.path().join("d.png"),
        })
        .to_string();
        let resp = handle_line(&line, &DiffOptions::default()).await;
        assert_eq!(resp, JobResponse::default());
    }

    #[tokio::test]
    async fn malformed_line_is_an_error_response() {
        let resp = handle_line("{ nope", &DiffOptions::default()).await;
        assert!(resp.error.unwrap().starts_with("malformed request"));
        assert!(resp.result.is_none());
    }
}
