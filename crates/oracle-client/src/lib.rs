//! Suggestion-oracle boundary for cartprobe.
//!
//! The engine consults an external decision service for selector
//! suggestions, overlay dismissal, login strategy, option-fill plans,
//! and vision-based navigation. Responses arrive as untyped JSON and
//! are validated strictly at this boundary: anything malformed becomes
//! an `OracleError` and the caller falls through to its next tier.

pub mod errors;
pub mod gemini;
pub mod mock;
pub mod parse;
pub mod types;

use async_trait::async_trait;

use cartprobe_core_types::{ControlDescriptor, ElementDescriptor, Intent};

pub use errors::OracleError;
pub use gemini::GeminiOracle;
pub use mock::MockOracle;
pub use types::{CloseAction, FillInstruction, FillKind, LoginAdvice, LoginPath, VisionAdvice};

/// External decision service consulted during resolution.
#[async_trait]
pub trait SuggestionOracle: Send + Sync {
    /// Ranked element addresses likely to perform `intent`. Addresses
    /// outside the candidate set are filtered by the caller.
    async fn suggest_addresses(
        &self,
        candidates: &[ElementDescriptor],
        intent: &Intent,
    ) -> Result<Vec<String>, OracleError>;

    /// Close affordances for the given obstructions, highest priority
    /// first.
    async fn suggest_dismissals(
        &self,
        obstructions: &[ElementDescriptor],
    ) -> Result<Vec<CloseAction>, OracleError>;

    /// Guest/credential/social strategy for a login wall, or `None`
    /// when the oracle sees no login flow.
    async fn suggest_login(
        &self,
        elements: &[ElementDescriptor],
    ) -> Result<Option<LoginAdvice>, OracleError>;

    /// Priority-ordered plan for satisfying prerequisite controls.
    async fn suggest_option_fill(
        &self,
        controls: &[ControlDescriptor],
    ) -> Result<Vec<FillInstruction>, OracleError>;

    /// Vision-based single-shot suggestion from a screenshot and the
    /// current markup. Must carry a justification to be accepted.
    async fn suggest_from_vision(
        &self,
        screenshot_png: &[u8],
        markup: &str,
        intent: &Intent,
    ) -> Result<Option<VisionAdvice>, OracleError>;
}

/// Oracle used when no API key is configured: every call falls
/// through, leaving the heuristic and text tiers in charge.
#[derive(Debug, Default, Clone)]
pub struct DisabledOracle;

#[async_trait]
impl SuggestionOracle for DisabledOracle {
    async fn suggest_addresses(
        &self,
        _candidates: &[ElementDescriptor],
        _intent: &Intent,
    ) -> Result<Vec<String>, OracleError> {
        Err(OracleError::Disabled("no API key configured".into()))
    }

    async fn suggest_dismissals(
        &self,
        _obstructions: &[ElementDescriptor],
    ) -> Result<Vec<CloseAction>, OracleError> {
        Err(OracleError::Disabled("no API key configured".into()))
    }

    async fn suggest_login(
        &self,
        _elements: &[ElementDescriptor],
    ) -> Result<Option<LoginAdvice>, OracleError> {
        Err(OracleError::Disabled("no API key configured".into()))
    }

    async fn suggest_option_fill(
        &self,
        _controls: &[ControlDescriptor],
    ) -> Result<Vec<FillInstruction>, OracleError> {
        Err(OracleError::Disabled("no API key configured".into()))
    }

    async fn suggest_from_vision(
        &self,
        _screenshot_png: &[u8],
        _markup: &str,
        _intent: &Intent,
    ) -> Result<Option<VisionAdvice>, OracleError> {
        Err(OracleError::Disabled("no API key configured".into()))
    }
}
