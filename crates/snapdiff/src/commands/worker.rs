use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::ResolvedRunConfig;
use crate::job::protocol;

/// `snapdiff worker`: serve diff requests from stdin, one JSON object per
/// line, answering each with one JSON line on stdout before reading the next.
pub async fn worker(config: ResolvedRunConfig) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!(threshold = config.options.threshold, "worker ready");

    let mut served = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = protocol::handle_line(&line, &config.options).await;
        let mut out = serde_json::to_vec(&response).context("Failed to serialize response")?;
        out.push(b'\n');
        stdout
            .write_all(&out)
            .await
            .context("Failed to write response")?;
        stdout.flush().await.context("Failed to write response")?;
        served += 1;
        debug!(served, "response sent");
    }

    info!(served, "stdin closed, exiting");
    Ok(())
}
