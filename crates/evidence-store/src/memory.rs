//! In-memory recorder/reporter doubles for engine tests.

use std::sync::Mutex;

use async_trait::async_trait;

use cartprobe_core_types::{RunId, RunResult, StepRecord};

use crate::{EvidenceRecorder, RunReporter};

/// Recorder that captures everything it is handed.
#[derive(Default)]
pub struct MemoryRecorder {
    pub screenshots: Mutex<Vec<(u32, usize)>>,
    pub markups: Mutex<Vec<u32>>,
    pub steps: Mutex<Vec<StepRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_records(&self) -> Vec<StepRecord> {
        self.steps.lock().expect("steps poisoned").clone()
    }

    /// (step index, byte length) of every screenshot recorded.
    pub fn screenshot_log(&self) -> Vec<(u32, usize)> {
        self.screenshots.lock().expect("screenshots poisoned").clone()
    }
}

#[async_trait]
impl EvidenceRecorder for MemoryRecorder {
    async fn record_screenshot(&self, _run: &RunId, step: u32, png: &[u8]) {
        self.screenshots
            .lock()
            .expect("screenshots poisoned")
            .push((step, png.len()));
    }

    async fn record_markup(&self, _run: &RunId, step: u32, _markup: &str) {
        self.markups.lock().expect("markups poisoned").push(step);
    }

    async fn append_step(&self, _run: &RunId, record: &StepRecord) {
        self.steps
            .lock()
            .expect("steps poisoned")
            .push(record.clone());
    }

    fn evidence_path(&self, run: &RunId) -> String {
        format!("memory://{run}")
    }
}

/// Reporter that captures terminal results.
#[derive(Default)]
pub struct MemoryReporter {
    pub results: Mutex<Vec<RunResult>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> Vec<RunResult> {
        self.results.lock().expect("results poisoned").clone()
    }
}

#[async_trait]
impl RunReporter for MemoryReporter {
    async fn report(&self, result: &RunResult) {
        self.results
            .lock()
            .expect("results poisoned")
            .push(result.clone());
    }
}
