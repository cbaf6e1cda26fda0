//! Filesystem evidence recorder.
//!
//! Layout under the evidence root:
//!
//! ```text
//! <root>/<run_id>/step_0.png
//! <root>/<run_id>/step_0.html
//! <root>/<run_id>/log.jsonl
//! <root>/evidence_errors.log
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use cartprobe_core_types::{RunId, StepRecord};

use crate::EvidenceRecorder;

const ERROR_LOG: &str = "evidence_errors.log";

pub struct FsEvidenceRecorder {
    root: PathBuf,
}

impl FsEvidenceRecorder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run_dir(&self, run: &RunId) -> PathBuf {
        self.root.join(run.to_string())
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) {
        if let Err(err) = self.try_write(path, bytes).await {
            self.log_error(path, &err).await;
        }
    }

    async fn try_write(&self, path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<(), std::io::Error> {
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

    async fn log_error(&self, path: &Path, err: &std::io::Error) {
        warn!(path = %path.display(), %err, "evidence write failed");
        let entry = format!("{} {} {}", Utc::now().to_rfc3339(), path.display(), err);
        if let Err(log_err) = self.append_line(&self.root.join(ERROR_LOG), &entry).await {
            warn!(%log_err, "evidence error log unavailable");
        }
    }
}

#[async_trait]
impl EvidenceRecorder for FsEvidenceRecorder {
    async fn record_screenshot(&self, run: &RunId, step: u32, png: &[u8]) {
        let path = self.run_dir(run).join(format!("step_{step}.png"));
        self.write_file(&path, png).await;
    }

    async fn record_markup(&self, run: &RunId, step: u32, markup: &str) {
        let path = self.run_dir(run).join(format!("step_{step}.html"));
        self.write_file(&path, markup.as_bytes()).await;
    }

    async fn append_step(&self, run: &RunId, record: &StepRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "step record not serializable");
                return;
            }
        };
        let path = self.run_dir(run).join("log.jsonl");
        if let Err(err) = self.append_line(&path, &line).await {
            self.log_error(&path, &err).await;
        }
    }

    fn evidence_path(&self, run: &RunId) -> String {
        self.run_dir(run).display().to_string()
    }
}
