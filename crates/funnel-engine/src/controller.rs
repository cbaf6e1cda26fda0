//! Retry & proxy controller: the outermost loop of a run.
//!
//! One progression attempt per egress identity. Recoverable failures
//! (bot challenge, navigation, internal) burn the identity and rotate;
//! content-attributable outcomes (login, no-selector, halted) end the
//! run at once. A global wall-clock budget races the whole loop and
//! abandons the in-flight session when it fires.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use cartprobe_core_types::{
    EgressIdentity, FailureKind, GatewayMatch, HaltReason, Intent, RunId, RunResult, RunStatus,
    StepRecord,
};
use cdp_driver::{BrowserDriver, BrowserSession, LaunchOptions};
use evidence_store::{EvidenceRecorder, RunReporter};
use oracle_client::SuggestionOracle;

use crate::config::EngineConfig;
use crate::errors::EngineFailure;
use crate::progression::{AttemptOutcome, Progression};
use crate::proxy::IdentityPool;

/// One run request: target, ordered action plan and opaque caller
/// context echoed back in the result.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub url: String,
    pub plan: Vec<Intent>,
    pub run_context: serde_json::Value,
}

impl RunRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            plan: vec![Intent::new("add to cart"), Intent::new("checkout")],
            run_context: serde_json::Value::Null,
        }
    }

    pub fn with_plan(mut self, plan: Vec<Intent>) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.run_context = context;
        self
    }
}

/// State accumulated across attempts, shared with the timeout arm so
/// an abandoned run still yields its partial log.
#[derive(Default)]
struct RunShared {
    log: std::sync::Mutex<Vec<StepRecord>>,
    gateways: std::sync::Mutex<Vec<GatewayMatch>>,
    last_identity: std::sync::Mutex<Option<EgressIdentity>>,
    active: tokio::sync::Mutex<Option<Arc<dyn BrowserSession>>>,
}

pub struct CheckoutEngine {
    driver: Arc<dyn BrowserDriver>,
    oracle: Arc<dyn SuggestionOracle>,
    recorder: Arc<dyn EvidenceRecorder>,
    reporter: Arc<dyn RunReporter>,
    config: EngineConfig,
}

impl CheckoutEngine {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        oracle: Arc<dyn SuggestionOracle>,
        recorder: Arc<dyn EvidenceRecorder>,
        reporter: Arc<dyn RunReporter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            driver,
            oracle,
            recorder,
            reporter,
            config,
        }
    }

    /// Drive one full run to its terminal result. Never errors: every
    /// way a run can end is a `RunResult`.
    pub async fn run(&self, request: RunRequest) -> RunResult {
        let run_id = RunId::new();
        let shared = Arc::new(RunShared::default());

        let result = match tokio::time::timeout(
            self.config.global_budget(),
            self.attempt_loop(&run_id, &request, &shared),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(run_id = %run_id, "global budget exceeded, abandoning session");
                if let Some(session) = shared.active.lock().await.take() {
                    let _ = session.close().await;
                }
                self.finalize(
                    &run_id,
                    &request,
                    &shared,
                    RunStatus::Failure,
                    Some(FailureKind::Navigation),
                    None,
                )
            }
        };

        self.reporter.report(&result).await;
        result
    }

    async fn attempt_loop(
        &self,
        run_id: &RunId,
        request: &RunRequest,
        shared: &Arc<RunShared>,
    ) -> RunResult {
        let mut pool = IdentityPool::new(
            &self.config.proxies,
            &self.config.user_agents,
            self.config.reuse_exhausted_proxies,
        );
        let options = LaunchOptions {
            headless: self.config.headless,
            page_timeout: self.config.page_timeout(),
        };
        let progression = Progression::new(
            Arc::clone(&self.oracle),
            Arc::clone(&self.recorder),
            self.config.clone(),
        );

        let max_attempts = self.config.max_retries + 1;
        let mut last_failure: Option<EngineFailure> = None;

        for attempt in 0..max_attempts {
            let Some(identity) = pool.next_identity() else {
                info!(run_id = %run_id, "identity pool exhausted");
                return self.finalize(
                    run_id,
                    request,
                    shared,
                    RunStatus::Failure,
                    Some(FailureKind::AllProxyFailed),
                    None,
                );
            };
            *shared.last_identity.lock().expect("identity poisoned") = Some(identity.clone());
            info!(run_id = %run_id, attempt, identity = %identity.label(), "attempt starting");

            let session = match self.driver.launch(&identity, &options).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(%err, "browser launch failed");
                    pool.mark_used(&identity);
                    last_failure = Some(EngineFailure::navigation(err.to_string()));
                    continue;
                }
            };
            *shared.active.lock().await = Some(Arc::clone(&session));

            let first_step = shared.log.lock().expect("log poisoned").len() as u32;
            let report = progression
                .execute(run_id, &session, &request.url, &request.plan, first_step)
                .await;

            let _ = session.close().await;
            *shared.active.lock().await = None;
            shared
                .log
                .lock()
                .expect("log poisoned")
                .extend(report.log);
            shared
                .gateways
                .lock()
                .expect("gateways poisoned")
                .extend(report.gateways);

            match report.outcome {
                AttemptOutcome::Success => {
                    return self.finalize(run_id, request, shared, RunStatus::Success, None, None);
                }
                AttemptOutcome::Halted(reason) => {
                    return self.finalize(
                        run_id,
                        request,
                        shared,
                        RunStatus::Halted,
                        None,
                        Some(reason),
                    );
                }
                AttemptOutcome::Failure(failure) => {
                    pool.mark_used(&identity);
                    let rotate = failure.is_recoverable()
                        && (failure.kind != FailureKind::Captcha || self.config.captcha_rotates);

                    // Intermediate failures are reported as they happen.
                    let interim = self.finalize(
                        run_id,
                        request,
                        shared,
                        RunStatus::Failure,
                        Some(failure.kind),
                        None,
                    );
                    if rotate && attempt + 1 < max_attempts {
                        self.reporter.report(&interim).await;
                        warn!(failure = %failure, "attempt failed, rotating identity");
                        last_failure = Some(failure);
                        continue;
                    }
                    return interim;
                }
            }
        }

        let kind = last_failure
            .map(|failure| failure.kind)
            .unwrap_or(FailureKind::Internal);
        self.finalize(run_id, request, shared, RunStatus::Failure, Some(kind), None)
    }

    fn finalize(
        &self,
        run_id: &RunId,
        request: &RunRequest,
        shared: &Arc<RunShared>,
        status: RunStatus,
        failure_kind: Option<FailureKind>,
        halt_reason: Option<HaltReason>,
    ) -> RunResult {
        let log = shared.log.lock().expect("log poisoned").clone();
        let gateways = shared.gateways.lock().expect("gateways poisoned").clone();
        let mut names = Vec::new();
        for gateway in &gateways {
            if !names.contains(&gateway.gateway) {
                names.push(gateway.gateway.clone());
            }
        }
        RunResult {
            run_id: run_id.clone(),
            url: request.url.clone(),
            status,
            failure_kind,
            halt_reason,
            step_index: log.last().map(|record| record.index).unwrap_or(0),
            egress_identity: shared
                .last_identity
                .lock()
                .expect("identity poisoned")
                .clone(),
            evidence_path: self.recorder.evidence_path(run_id),
            log,
            detected_gateways: names,
            run_context: request.run_context.clone(),
            finished_at: Utc::now(),
        }
    }
}
