//! Keyword heuristics for purchase-funnel elements.
//!
//! Scoring is banded: a direct intent/vocabulary hit beats overlay
//! context, which beats nothing. Within the vocabulary, more specific
//! phrases are listed first and score higher, so "place order"
//! outranks a bare "pay".

use std::collections::HashSet;

use cartprobe_core_types::{ElementDescriptor, Intent};

/// Purchase-progression vocabulary, most specific phrases first.
pub const CHECKOUT_TEXTS: [&str; 13] = [
    "continue to checkout",
    "go to checkout",
    "continue to payment",
    "proceed to pay",
    "place order",
    "review order",
    "order now",
    "pay now",
    "buy now",
    "checkout",
    "proceed",
    "payment",
    "pay",
];

const INTENT_HIT: u32 = 120;
const VOCAB_BASE: u32 = 100;
const OVERLAY_BONUS: u32 = 30;

/// Band score for one element against an intent. Zero means the
/// element is not a candidate.
pub fn score(element: &ElementDescriptor, intent: &Intent) -> u32 {
    let haystack = element.haystack();
    let needle = intent.as_str().to_lowercase();

    let mut score = 0;
    if !needle.is_empty() && haystack.contains(&needle) {
        score += INTENT_HIT;
    }
    if let Some(position) = CHECKOUT_TEXTS
        .iter()
        .position(|phrase| haystack.contains(phrase))
    {
        score += VOCAB_BASE - position as u32;
    }
    // A matching element inside a cart drawer or modal is usually the
    // live one; the same text in the page behind it is stale.
    if score > 0 && element.in_overlay_context() {
        score += OVERLAY_BONUS;
    }
    score
}

/// Ranked addresses for elements the vocabulary recognizes. Stable
/// within a band, deduplicated, best first.
pub fn rank(candidates: &[ElementDescriptor], intent: &Intent) -> Vec<String> {
    let mut scored: Vec<(u32, &ElementDescriptor)> = candidates
        .iter()
        .map(|element| (score(element, intent), element))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    dedup_addresses(scored.into_iter().map(|(_, element)| element.address.clone()))
}

/// Last-resort textual match: the element's own visible text contains
/// a token of the intent. Much weaker than [`rank`] because it ignores
/// labels, ids and classes.
pub fn text_fallback(candidates: &[ElementDescriptor], intent: &Intent) -> Vec<String> {
    let tokens: Vec<String> = intent
        .as_str()
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.len() >= 3)
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    dedup_addresses(
        candidates
            .iter()
            .filter(|element| {
                let text = element.text.to_lowercase();
                tokens.iter().any(|token| text.contains(token))
            })
            .map(|element| element.address.clone()),
    )
}

/// Order-preserving address dedup.
pub fn dedup_addresses(addresses: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|address| !address.is_empty() && seen.insert(address.clone()))
        .collect()
}
