//! Outbound result reporting.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use cartprobe_core_types::RunResult;

use crate::RunReporter;

const ERROR_LOG: &str = "report_errors.log";

/// POSTs the terminal `RunResult` as JSON to a configured endpoint.
/// Failures are appended to `report_errors.log` next to the evidence
/// and never surface to the caller.
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
    error_log_dir: PathBuf,
}

impl HttpReporter {
    pub fn new(endpoint: impl Into<String>, error_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            error_log_dir: error_log_dir.into(),
        }
    }

    async fn log_failure(&self, result: &RunResult, reason: &str) {
        warn!(run_id = %result.run_id, reason, "result report failed");
        let entry = format!(
            "{} run={} endpoint={} reason={}",
            Utc::now().to_rfc3339(),
            result.run_id,
            self.endpoint,
            reason,
        );
        if let Err(err) = append_line(&self.error_log_dir.join(ERROR_LOG), &entry).await {
            warn!(%err, "report error log unavailable");
        }
    }
}

async fn append_line(path: &std::path::Path, line: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

#[async_trait]
impl RunReporter for HttpReporter {
    async fn report(&self, result: &RunResult) {
        match self.client.post(&self.endpoint).json(result).send().await {
            Ok(response) if response.status().is_success() => {
                info!(run_id = %result.run_id, "result reported");
            }
            Ok(response) => {
                self.log_failure(result, &format!("status {}", response.status()))
                    .await;
            }
            Err(err) => {
                self.log_failure(result, &err.to_string()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartprobe_core_types::{RunId, RunStatus};

    fn result() -> RunResult {
        RunResult {
            run_id: RunId::new(),
            url: "https://shop.example".into(),
            status: RunStatus::Failure,
            failure_kind: None,
            halt_reason: None,
            step_index: 0,
            egress_identity: None,
            evidence_path: String::new(),
            log: Vec::new(),
            detected_gateways: Vec::new(),
            run_context: serde_json::Value::Null,
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_logs_and_returns() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = HttpReporter::new("http://127.0.0.1:1/report", dir.path());

        // Must not error or panic.
        reporter.report(&result()).await;

        let errors = std::fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        assert!(errors.contains("http://127.0.0.1:1/report"));
    }
}
