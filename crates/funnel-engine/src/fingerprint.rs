//! Payment-gateway fingerprinting.
//!
//! Substring patterns over everything the page has leaked so far:
//! script sources, iframe sources, observed network request URLs, raw
//! markup and visible text. A match anywhere is evidence; matches are
//! deduplicated per gateway.

use std::collections::HashSet;

use cartprobe_core_types::{GatewayMatch, MatchSource};

/// Known gateway patterns, matched lower-cased.
const GATEWAY_PATTERNS: [(&str, &[&str]); 12] = [
    ("Shiprocket Checkout", &["shiprocket", "fastrr"]),
    ("GoKwik", &["gokwik"]),
    ("Razorpay Checkout", &["checkout.razorpay.com", "razorpay"]),
    ("Simpl", &["getsimpl", "simpl.com"]),
    ("Shopify Payments", &["shopify", "shop.app/checkout"]),
    ("PayU", &["payu.in", "payubiz", "payumoney"]),
    ("Cashfree", &["cashfree"]),
    ("PhonePe", &["phonepe"]),
    ("Juspay", &["juspay"]),
    ("Magento Checkout", &["magento"]),
    ("CCAvenue", &["ccavenue"]),
    ("PayPal", &["paypal"]),
];

/// Everything fingerprinting looks at, gathered from one session.
#[derive(Debug, Default, Clone)]
pub struct PageSignals {
    pub script_sources: Vec<String>,
    pub iframe_sources: Vec<String>,
    pub network_requests: Vec<String>,
    pub markup: String,
    pub visible_text: String,
}

/// Match the signal set against the gateway table. One match per
/// gateway, first source wins.
pub fn fingerprint(signals: &PageSignals) -> Vec<GatewayMatch> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut matches = Vec::new();

    let haystacks: [(MatchSource, Vec<String>); 5] = [
        (MatchSource::Script, lower_all(&signals.script_sources)),
        (MatchSource::Iframe, lower_all(&signals.iframe_sources)),
        (MatchSource::Network, lower_all(&signals.network_requests)),
        (MatchSource::Markup, vec![signals.markup.to_lowercase()]),
        (MatchSource::Text, vec![signals.visible_text.to_lowercase()]),
    ];

    for (gateway, patterns) in GATEWAY_PATTERNS {
        'gateway: for pattern in patterns {
            for (source, entries) in &haystacks {
                if entries.iter().any(|entry| entry.contains(pattern)) {
                    if seen.insert(gateway) {
                        matches.push(GatewayMatch {
                            gateway: gateway.to_string(),
                            pattern: (*pattern).to_string(),
                            source: *source,
                        });
                    }
                    break 'gateway;
                }
            }
        }
    }
    matches
}

fn lower_all(entries: &[String]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn razorpay_script_source_matches() {
        let signals = PageSignals {
            script_sources: vec!["https://checkout.razorpay.com/v1/checkout.js".into()],
            ..Default::default()
        };
        let matches = fingerprint(&signals);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].gateway, "Razorpay Checkout");
        assert_eq!(matches[0].pattern, "checkout.razorpay.com");
        assert_eq!(matches[0].source, MatchSource::Script);
    }

    #[test]
    fn network_handshake_matches() {
        let signals = PageSignals {
            network_requests: vec!["https://api.gokwik.co/v4/session".into()],
            ..Default::default()
        };
        let matches = fingerprint(&signals);
        assert_eq!(matches[0].gateway, "GoKwik");
        assert_eq!(matches[0].source, MatchSource::Network);
    }

    #[test]
    fn one_match_per_gateway() {
        let signals = PageSignals {
            script_sources: vec!["https://checkout.razorpay.com/v1/checkout.js".into()],
            iframe_sources: vec!["https://api.razorpay.com/frame".into()],
            markup: "razorpay everywhere".into(),
            ..Default::default()
        };
        assert_eq!(fingerprint(&signals).len(), 1);
    }

    #[test]
    fn simple_words_do_not_false_positive() {
        let signals = PageSignals {
            visible_text: "A simple checkout with free shipping".into(),
            markup: "<p>simply the best image</p>".into(),
            ..Default::default()
        };
        assert!(fingerprint(&signals).is_empty());
    }
}
