//! Shared primitives for the cartprobe checkout automation engine.
//!
//! Everything that crosses a crate boundary lives here: element and
//! form-control descriptors produced by DOM snapshots, intents and
//! resolution outcomes, the append-only run log, and the terminal
//! `RunResult` record.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one engine run (all retry attempts included).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network egress identity for one attempt: proxy endpoint plus the
/// browser user agent presented through it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressIdentity {
    /// Proxy endpoint, e.g. `http://10.0.0.1:3128`. `None` means direct.
    pub proxy: Option<String>,
    /// User-agent string presented to the target.
    pub user_agent: String,
}

impl EgressIdentity {
    pub fn direct(user_agent: impl Into<String>) -> Self {
        Self {
            proxy: None,
            user_agent: user_agent.into(),
        }
    }

    /// Short label for logs and the outbound report.
    pub fn label(&self) -> String {
        match &self.proxy {
            Some(proxy) => proxy.clone(),
            None => "direct".to_string(),
        }
    }
}

/// The logical user action the engine is trying to perform on the
/// page ("add to cart", "checkout", "pay"). Opaque to the engine;
/// only the resolver interprets it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Intent(pub String);

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self(action.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Intent {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Snapshot of one interactive element, produced in-page.
///
/// `address` is a structural CSS path valid only within the current
/// document state; it must never be persisted across navigations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Tag name, lower case ("button", "a", "input").
    pub tag: String,
    /// Visible text, cropped by the snapshot script.
    #[serde(default)]
    pub text: String,
    /// Accessible label (`aria-label`).
    #[serde(default)]
    pub aria_label: String,
    /// DOM id attribute.
    #[serde(default)]
    pub dom_id: String,
    /// Space-separated class list.
    #[serde(default)]
    pub classes: String,
    /// Structural locator for the element in the live document.
    pub address: String,
    /// Whether the element is structurally disabled.
    #[serde(default)]
    pub disabled: bool,
}

impl ElementDescriptor {
    /// Concatenated lower-cased haystack used by keyword heuristics.
    pub fn haystack(&self) -> String {
        format!(
            "{} {} {} {}",
            self.text, self.aria_label, self.classes, self.dom_id
        )
        .to_lowercase()
    }

    /// Whether the descriptor sits inside an overlay-like container
    /// (judged from its class list).
    pub fn in_overlay_context(&self) -> bool {
        const OVERLAY_MARKERS: [&str; 6] = ["modal", "drawer", "overlay", "popup", "sheet", "flyout"];
        let classes = self.classes.to_lowercase();
        OVERLAY_MARKERS.iter().any(|m| classes.contains(m))
    }
}

/// Kind of form or selection control the remediator can operate on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    Select,
    Radio,
    Checkbox,
    Text,
    /// Button-like variant pickers (size/color swatches).
    Swatch,
}

impl ControlKind {
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::Select => "select",
            ControlKind::Radio => "radio",
            ControlKind::Checkbox => "checkbox",
            ControlKind::Text => "text",
            ControlKind::Swatch => "swatch",
        }
    }
}

/// Snapshot of one visible form/selection control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub kind: ControlKind,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: String,
    #[serde(default)]
    pub dom_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub autocomplete: String,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub required: bool,
    pub address: String,
    /// Option labels for selects, cropped.
    #[serde(default)]
    pub options: Vec<String>,
}

/// Which tier of the resolution cascade produced an outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Oracle,
    Heuristic,
    TextFallback,
    Vision,
    None,
}

impl Provenance {
    pub fn name(&self) -> &'static str {
        match self {
            Provenance::Oracle => "oracle",
            Provenance::Heuristic => "heuristic",
            Provenance::TextFallback => "text-fallback",
            Provenance::Vision => "vision",
            Provenance::None => "none",
        }
    }
}

/// Ranked addresses produced by one resolution pass. Immutable once
/// created; consumed once per step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub addresses: Vec<String>,
    pub provenance: Provenance,
}

impl ResolutionOutcome {
    pub fn new(addresses: Vec<String>, provenance: Provenance) -> Self {
        Self {
            addresses,
            provenance,
        }
    }

    pub fn empty() -> Self {
        Self {
            addresses: Vec::new(),
            provenance: Provenance::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Outcome of one progression step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Failure,
}

/// One entry of the append-only run log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: u32,
    pub intent: String,
    pub provenance: Provenance,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn success(index: u32, intent: &Intent, provenance: Provenance) -> Self {
        Self {
            index,
            intent: intent.0.clone(),
            provenance,
            outcome: StepOutcome::Success,
            error: None,
        }
    }

    pub fn failure(
        index: u32,
        intent: &Intent,
        provenance: Provenance,
        error: impl Into<String>,
    ) -> Self {
        Self {
            index,
            intent: intent.0.clone(),
            provenance,
            outcome: StepOutcome::Failure,
            error: Some(error.into()),
        }
    }
}

/// Failure taxonomy for terminal run states.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Bot challenge detected; recoverable via identity rotation.
    Captcha,
    /// Credential/guest flow broke; fatal to the run.
    Login,
    /// Resolution cascade exhausted; fatal to the run.
    NoSelector,
    /// Driver or network exception; recoverable via identity rotation.
    Navigation,
    /// Unexpected engine error; recoverable via identity rotation.
    Internal,
    /// Proxy pool exhausted without success; final fatal outcome.
    AllProxyFailed,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Captcha => "captcha",
            FailureKind::Login => "login",
            FailureKind::NoSelector => "no-selector",
            FailureKind::Navigation => "navigation",
            FailureKind::Internal => "internal",
            FailureKind::AllProxyFailed => "all-proxy-failed",
        }
    }

    /// Whether rotating the egress identity may help on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FailureKind::Captcha | FailureKind::Navigation | FailureKind::Internal
        )
    }
}

/// Reason for a deliberate halt (not an error).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// A one-time-passcode challenge needs a live human.
    OtpRequired,
}

impl HaltReason {
    pub fn name(&self) -> &'static str {
        match self {
            HaltReason::OtpRequired => "otp_required",
        }
    }
}

/// Terminal run status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Halted,
}

/// Where a gateway fingerprint pattern matched.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Script,
    Iframe,
    Network,
    Markup,
    Text,
}

/// One detected payment-gateway fingerprint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GatewayMatch {
    /// Display name, e.g. "Razorpay Checkout".
    pub gateway: String,
    /// The pattern that matched.
    pub pattern: String,
    pub source: MatchSource,
}

/// Terminal record for one run. Created exactly once, immutable once
/// returned. Serialized camelCase: this is the outbound report wire
/// shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: RunId,
    pub url: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<HaltReason>,
    /// Index of the step at which the run concluded.
    pub step_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress_identity: Option<EgressIdentity>,
    pub evidence_path: String,
    pub log: Vec<StepRecord>,
    pub detected_gateways: Vec<String>,
    /// Opaque caller context echoed back in the result.
    #[serde(default)]
    pub run_context: serde_json::Value,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
