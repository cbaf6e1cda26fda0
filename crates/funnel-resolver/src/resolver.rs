//! The intent-to-address resolution cascade.
//!
//! Tiers run strictly in order and each consumes a fresh snapshot of
//! the page it was handed:
//!
//! 1. oracle suggestion over a capped candidate set, validated against
//!    the candidates it actually saw
//! 2. keyword heuristics over the full candidate set
//! 3. text-only fallback
//! 4. vision (screenshot + markup), which must arrive justified
//!
//! A tier that errors or returns nothing falls through; the cascade
//! itself never fails, it returns an empty outcome.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use cartprobe_core_types::{ElementDescriptor, Intent, Provenance, ResolutionOutcome};
use cdp_driver::{DriverError, PageSession};
use oracle_client::SuggestionOracle;

use crate::heuristics;

pub struct AddressResolver {
    oracle: Arc<dyn SuggestionOracle>,
    /// Cap on candidates offered to the oracle per call.
    max_elements: usize,
}

impl AddressResolver {
    pub fn new(oracle: Arc<dyn SuggestionOracle>, max_elements: usize) -> Self {
        Self {
            oracle,
            max_elements,
        }
    }

    /// Resolve `intent` against the page's current state. The outcome
    /// is bound to that state: callers must not reuse it after a
    /// navigation or retry.
    pub async fn resolve(
        &self,
        page: &dyn PageSession,
        intent: &Intent,
    ) -> Result<ResolutionOutcome, DriverError> {
        let candidates = page.interactive_elements().await?;

        if !candidates.is_empty() {
            if let Some(outcome) = self.oracle_tier(&candidates, intent).await {
                return Ok(outcome);
            }

            let ranked = heuristics::rank(&candidates, intent);
            if !ranked.is_empty() {
                debug!(intent = intent.as_str(), count = ranked.len(), "heuristic tier resolved");
                return Ok(ResolutionOutcome::new(ranked, Provenance::Heuristic));
            }

            let textual = heuristics::text_fallback(&candidates, intent);
            if !textual.is_empty() {
                debug!(intent = intent.as_str(), count = textual.len(), "text-fallback tier resolved");
                return Ok(ResolutionOutcome::new(textual, Provenance::TextFallback));
            }
        }

        if let Some(outcome) = self.vision_tier(page, intent).await? {
            return Ok(outcome);
        }

        debug!(intent = intent.as_str(), "resolution cascade exhausted");
        Ok(ResolutionOutcome::empty())
    }

    async fn oracle_tier(
        &self,
        candidates: &[ElementDescriptor],
        intent: &Intent,
    ) -> Option<ResolutionOutcome> {
        let capped = &candidates[..candidates.len().min(self.max_elements)];
        let known: HashSet<&str> = capped
            .iter()
            .map(|element| element.address.as_str())
            .collect();

        match self.oracle.suggest_addresses(capped, intent).await {
            Ok(proposed) => {
                // Only addresses the oracle was actually shown count;
                // anything else is a hallucinated locator.
                let rejected = proposed
                    .iter()
                    .filter(|address| !known.contains(address.as_str()))
                    .count();
                if rejected > 0 {
                    warn!(rejected, "oracle proposed addresses outside the candidate set");
                }
                let valid = heuristics::dedup_addresses(
                    proposed
                        .into_iter()
                        .filter(|address| known.contains(address.as_str())),
                );
                if valid.is_empty() {
                    None
                } else {
                    debug!(intent = intent.as_str(), count = valid.len(), "oracle tier resolved");
                    Some(ResolutionOutcome::new(valid, Provenance::Oracle))
                }
            }
            Err(err) => {
                debug!(%err, "oracle tier unavailable");
                None
            }
        }
    }

    async fn vision_tier(
        &self,
        page: &dyn PageSession,
        intent: &Intent,
    ) -> Result<Option<ResolutionOutcome>, DriverError> {
        let screenshot = page.screenshot_full().await?;
        let markup = page.markup().await?;
        match self
            .oracle
            .suggest_from_vision(&screenshot, &markup, intent)
            .await
        {
            Ok(Some(advice)) => {
                debug!(
                    intent = intent.as_str(),
                    selector = %advice.selector,
                    justification = %advice.justification,
                    "vision tier resolved"
                );
                Ok(Some(ResolutionOutcome::new(
                    vec![advice.selector],
                    Provenance::Vision,
                )))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                debug!(%err, "vision tier unavailable");
                Ok(None)
            }
        }
    }
}
