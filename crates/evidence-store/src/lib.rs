//! Evidence capture and run reporting.
//!
//! Evidence is best-effort by contract: a full disk or an unreachable
//! report endpoint must never change the outcome of a run. Recorder
//! and reporter methods therefore return nothing; failures are
//! appended to side-channel error logs and traced.

pub mod fs;
pub mod memory;
pub mod report;

use async_trait::async_trait;

use cartprobe_core_types::{RunId, RunResult, StepRecord};

pub use fs::FsEvidenceRecorder;
pub use memory::{MemoryRecorder, MemoryReporter};
pub use report::HttpReporter;

/// Per-step forensic evidence sink.
#[async_trait]
pub trait EvidenceRecorder: Send + Sync {
    /// Persist a full-page screenshot for `step`.
    async fn record_screenshot(&self, run: &RunId, step: u32, png: &[u8]);

    /// Persist the page markup for `step`.
    async fn record_markup(&self, run: &RunId, step: u32, markup: &str);

    /// Append one step record to the run log.
    async fn append_step(&self, run: &RunId, record: &StepRecord);

    /// Where this run's evidence lives, for the terminal result.
    fn evidence_path(&self, run: &RunId) -> String;
}

/// Outbound sink for terminal run results.
#[async_trait]
pub trait RunReporter: Send + Sync {
    /// Deliver the result. Fire-and-forget: delivery failure is logged
    /// and swallowed.
    async fn report(&self, result: &RunResult);
}

/// Reporter used when no endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopReporter;

#[async_trait]
impl RunReporter for NoopReporter {
    async fn report(&self, _result: &RunResult) {}
}
