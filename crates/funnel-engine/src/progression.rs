//! The progression state machine: one attempt at the funnel.
//!
//! Fixed order per attempt: navigate, initial gate, then per action a
//! gate / login / resolve+act cycle, then post-action autofill, the
//! OTP gate and gateway fingerprinting. Every state produces evidence;
//! exactly one terminal outcome leaves `execute`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cartprobe_core_types::{
    GatewayMatch, HaltReason, Intent, Provenance, RunId, StepRecord,
};
use cdp_driver::{BrowserSession, PageSession};
use evidence_store::EvidenceRecorder;
use funnel_resolver::{heuristics, AddressResolver, OptionRemediator, OverlaySuppressor};
use oracle_client::SuggestionOracle;

use crate::autofill;
use crate::config::EngineConfig;
use crate::errors::EngineFailure;
use crate::fingerprint::{self, PageSignals};
use crate::gates;
use crate::login::LoginHandler;
use crate::otp;

/// How long a resolved candidate gets to become visible.
const CANDIDATE_WAIT: std::time::Duration = std::time::Duration::from_secs(3);

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Failure(EngineFailure),
    Halted(HaltReason),
}

/// Everything one attempt produced.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub log: Vec<StepRecord>,
    pub gateways: Vec<GatewayMatch>,
}

pub struct Progression {
    oracle: Arc<dyn SuggestionOracle>,
    resolver: AddressResolver,
    suppressor: OverlaySuppressor,
    remediator: OptionRemediator,
    login: LoginHandler,
    recorder: Arc<dyn EvidenceRecorder>,
    config: EngineConfig,
}

impl Progression {
    pub fn new(
        oracle: Arc<dyn SuggestionOracle>,
        recorder: Arc<dyn EvidenceRecorder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: AddressResolver::new(Arc::clone(&oracle), config.max_elements),
            suppressor: OverlaySuppressor::new(Arc::clone(&oracle), config.overlay_max_depth),
            remediator: OptionRemediator::new(Arc::clone(&oracle)),
            login: LoginHandler::new(Arc::clone(&oracle), config.credentials.clone()),
            oracle,
            recorder,
            config,
        }
    }

    /// Run the whole funnel once against a fresh session.
    ///
    /// `first_step` continues the run-wide step numbering: all retry
    /// attempts share one run id and one evidence directory, so their
    /// step indices must never collide.
    pub async fn execute(
        &self,
        run: &RunId,
        session: &Arc<dyn BrowserSession>,
        url: &str,
        plan: &[Intent],
        first_step: u32,
    ) -> AttemptReport {
        let mut log = RunLog::new(Arc::clone(&self.recorder), run.clone(), first_step);

        let main = match self.foreground_page(session).await {
            Ok(page) => page,
            Err(failure) => {
                return log.conclude_failure(None, &Intent::new("navigate"), failure).await;
            }
        };

        // Navigate
        let navigate = Intent::new("navigate");
        if let Err(err) = main.navigate(url, self.config.page_timeout()).await {
            let failure = EngineFailure::navigation(err.to_string());
            return log.conclude_failure(Some(&main), &navigate, failure).await;
        }
        log.step_ok(Some(&main), &navigate, Provenance::None).await;

        // Initial gate
        if let Err(failure) = self.gate(session).await {
            return log.conclude_failure(Some(&main), &Intent::new("gate"), failure).await;
        }

        // Per-action cycle
        for intent in plan {
            if let Err(failure) = self.gate(session).await {
                return log.conclude_failure(Some(&main), intent, failure).await;
            }
            if let Err(failure) = self.login.pass_wall(main.as_ref()).await {
                return log.conclude_failure(Some(&main), intent, failure).await;
            }
            match self.act(session, intent).await {
                Ok(provenance) => {
                    info!(intent = intent.as_str(), provenance = provenance.name(), "action performed");
                    log.step_ok(Some(&main), intent, provenance).await;
                }
                Err(failure) => {
                    return log.conclude_failure(Some(&main), intent, failure).await;
                }
            }
            tokio::time::sleep(self.config.action_delay()).await;
        }

        // Post-action autofill, never blocking.
        let filled = autofill::fill_checkout_fields(main.as_ref(), &self.config.test_data).await;
        debug!(filled, "post-action autofill");
        log.step_ok(Some(&main), &Intent::new("autofill"), Provenance::None)
            .await;

        // OTP gate
        if self.otp_present(session).await {
            log.step_ok(Some(&main), &Intent::new("otp-gate"), Provenance::None)
                .await;
            return log.conclude(
                AttemptOutcome::Halted(HaltReason::OtpRequired),
                Vec::new(),
            );
        }

        // Fingerprint
        let gateways = self.fingerprint(session, &main).await;
        log.step_ok(Some(&main), &Intent::new("fingerprint"), Provenance::None)
            .await;
        log.conclude(AttemptOutcome::Success, gateways)
    }

    async fn foreground_page(
        &self,
        session: &Arc<dyn BrowserSession>,
    ) -> Result<Arc<dyn PageSession>, EngineFailure> {
        let pages = session
            .pages()
            .await
            .map_err(|err| EngineFailure::navigation(err.to_string()))?;
        pages
            .into_iter()
            .next()
            .ok_or_else(|| EngineFailure::navigation("session has no pages"))
    }

    /// Overlay suppression plus bot-wall scan, across all open pages.
    async fn gate(&self, session: &Arc<dyn BrowserSession>) -> Result<(), EngineFailure> {
        let pages = session
            .pages()
            .await
            .map_err(|err| EngineFailure::internal(err.to_string()))?;
        self.suppressor.suppress(&pages).await;
        for page in &pages {
            let markup = page.markup().await.unwrap_or_default();
            let text = page.visible_text().await.unwrap_or_default();
            if let Some(marker) = gates::detect_bot_wall(&markup, &text) {
                warn!(marker, "bot wall detected");
                return Err(EngineFailure::captcha(marker));
            }
        }
        Ok(())
    }

    /// Resolve the intent and land one click, trying every open page.
    async fn act(
        &self,
        session: &Arc<dyn BrowserSession>,
        intent: &Intent,
    ) -> Result<Provenance, EngineFailure> {
        let pages = session
            .pages()
            .await
            .map_err(|err| EngineFailure::internal(err.to_string()))?;

        let mut vision_tried = false;
        for page in &pages {
            let outcome = self
                .resolver
                .resolve(page.as_ref(), intent)
                .await
                .map_err(|err| EngineFailure::internal(err.to_string()))?;
            // The resolver ends with its own vision tier whenever the
            // DOM tiers are empty; don't consult vision twice.
            vision_tried |= outcome.provenance == Provenance::Vision || outcome.is_empty();

            for address in &outcome.addresses {
                if !page.wait_visible(address, CANDIDATE_WAIT).await.unwrap_or(false) {
                    continue;
                }
                if page.is_disabled(address).await.unwrap_or(false) {
                    let report = self.remediator.remediate(page.as_ref()).await;
                    debug!(address = %address, ?report, "remediated disabled target");
                    if page.is_disabled(address).await.unwrap_or(true) {
                        continue;
                    }
                }
                // A dismissal may have landed on this page since
                // resolution; clear again right before the click.
                self.suppressor
                    .suppress(std::slice::from_ref(page))
                    .await;
                if page.click(address).await.is_ok() {
                    return Ok(outcome.provenance);
                }
                debug!(address = %address, "candidate click failed");
            }
        }

        // Candidates existed but none clicked: one vision-guided retry
        // on the foreground page, unless vision already had its shot.
        if !vision_tried {
            if let Some(page) = pages.first() {
                if let Ok(provenance) = self.vision_retry(page.as_ref(), intent).await {
                    return Ok(provenance);
                }
            }
        }

        Err(EngineFailure::no_selector(format!(
            "no clickable element for intent {:?}",
            intent.as_str()
        )))
    }

    async fn vision_retry(
        &self,
        page: &dyn PageSession,
        intent: &Intent,
    ) -> Result<Provenance, EngineFailure> {
        let screenshot = page
            .screenshot_full()
            .await
            .map_err(|err| EngineFailure::internal(err.to_string()))?;
        let markup = page
            .markup()
            .await
            .map_err(|err| EngineFailure::internal(err.to_string()))?;
        let advice = self
            .oracle
            .suggest_from_vision(&screenshot, &markup, intent)
            .await
            .map_err(|err| EngineFailure::no_selector(err.to_string()))?
            .ok_or_else(|| EngineFailure::no_selector("vision retry declined"))?;
        page.click(&advice.selector)
            .await
            .map_err(|err| EngineFailure::no_selector(err.to_string()))?;
        Ok(Provenance::Vision)
    }

    async fn otp_present(&self, session: &Arc<dyn BrowserSession>) -> bool {
        let Ok(pages) = session.pages().await else {
            return false;
        };
        for page in pages {
            let controls = page.form_controls().await.unwrap_or_default();
            if otp::detect_otp(&controls) {
                return true;
            }
        }
        false
    }

    /// Gather leak signals from every page plus the network tap; when
    /// nothing matched, probe once by clicking a pay affordance and
    /// re-reading the tap.
    async fn fingerprint(
        &self,
        session: &Arc<dyn BrowserSession>,
        main: &Arc<dyn PageSession>,
    ) -> Vec<GatewayMatch> {
        let mut matches = fingerprint::fingerprint(&self.gather_signals(session).await);
        if matches.is_empty() {
            if let Some(address) = self.pay_affordance(main.as_ref()).await {
                if main.click(&address).await.is_ok() {
                    tokio::time::sleep(self.config.action_delay()).await;
                    matches = fingerprint::fingerprint(&self.gather_signals(session).await);
                }
            }
        }
        matches
    }

    async fn gather_signals(&self, session: &Arc<dyn BrowserSession>) -> PageSignals {
        let mut signals = PageSignals {
            network_requests: session.observed_requests().await,
            ..Default::default()
        };
        let Ok(pages) = session.pages().await else {
            return signals;
        };
        for page in pages {
            signals
                .script_sources
                .extend(page.script_sources().await.unwrap_or_default());
            signals
                .iframe_sources
                .extend(page.iframe_sources().await.unwrap_or_default());
            signals.markup.push_str(&page.markup().await.unwrap_or_default());
            signals
                .visible_text
                .push_str(&page.visible_text().await.unwrap_or_default());
        }
        signals
    }

    async fn pay_affordance(&self, page: &dyn PageSession) -> Option<String> {
        let elements = page.interactive_elements().await.ok()?;
        heuristics::rank(&elements, &Intent::new("pay"))
            .into_iter()
            .next()
    }
}

/// Append-only attempt log with per-step evidence capture.
struct RunLog {
    recorder: Arc<dyn EvidenceRecorder>,
    run: RunId,
    first_step: u32,
    records: Vec<StepRecord>,
}

impl RunLog {
    fn new(recorder: Arc<dyn EvidenceRecorder>, run: RunId, first_step: u32) -> Self {
        Self {
            recorder,
            run,
            first_step,
            records: Vec::new(),
        }
    }

    fn next_index(&self) -> u32 {
        self.first_step + self.records.len() as u32
    }

    async fn capture(&self, page: Option<&Arc<dyn PageSession>>, step: u32) {
        let Some(page) = page else { return };
        if let Ok(png) = page.screenshot_full().await {
            self.recorder.record_screenshot(&self.run, step, &png).await;
        }
        if let Ok(markup) = page.markup().await {
            self.recorder.record_markup(&self.run, step, &markup).await;
        }
    }

    async fn step_ok(
        &mut self,
        page: Option<&Arc<dyn PageSession>>,
        intent: &Intent,
        provenance: Provenance,
    ) {
        let index = self.next_index();
        self.capture(page, index).await;
        let record = StepRecord::success(index, intent, provenance);
        self.recorder.append_step(&self.run, &record).await;
        self.records.push(record);
    }

    async fn conclude_failure(
        mut self,
        page: Option<&Arc<dyn PageSession>>,
        intent: &Intent,
        failure: EngineFailure,
    ) -> AttemptReport {
        let index = self.next_index();
        self.capture(page, index).await;
        let record = StepRecord::failure(index, intent, Provenance::None, failure.to_string());
        self.recorder.append_step(&self.run, &record).await;
        self.records.push(record);
        AttemptReport {
            outcome: AttemptOutcome::Failure(failure),
            log: self.records,
            gateways: Vec::new(),
        }
    }

    fn conclude(self, outcome: AttemptOutcome, gateways: Vec<GatewayMatch>) -> AttemptReport {
        AttemptReport {
            outcome,
            log: self.records,
            gateways,
        }
    }
}
