//! Resolution-cascade properties, exercised through the mock driver
//! and oracle.

use std::collections::VecDeque;
use std::sync::Arc;

use cartprobe_core_types::{Intent, Provenance};
use cdp_driver::mock::{element, MockPage, MockPageState};
use funnel_resolver::{AddressResolver, OverlaySuppressor};
use oracle_client::MockOracle;

#[tokio::test]
async fn oracle_tier_wins_in_its_own_order() {
    let oracle = Arc::new(MockOracle::new());
    // The oracle prefers #b; the heuristic would prefer #a ("Checkout"
    // scores above "Buy now" for this intent). The oracle must win.
    oracle.push_addresses(Ok(vec!["#b".into(), "#a".into()]));
    let page = MockPage::with_elements(vec![
        element("Checkout", "#a"),
        element("Buy now", "#b"),
    ]);
    let resolver = AddressResolver::new(oracle.clone(), 35);

    let outcome = resolver
        .resolve(page.as_ref(), &Intent::new("checkout"))
        .await
        .unwrap();
    assert_eq!(outcome.provenance, Provenance::Oracle);
    assert_eq!(outcome.addresses, vec!["#b", "#a"]);
    assert_eq!(oracle.calls(), vec!["suggest_addresses"]);
}

#[tokio::test]
async fn empty_oracle_falls_through_deterministically() {
    let candidates = vec![
        element("Checkout now", "#a"),
        element("Proceed to pay", "#b"),
        element("Read reviews", "#c"),
    ];
    let intent = Intent::new("checkout");

    let mut runs = Vec::new();
    for _ in 0..2 {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_addresses(Ok(vec![]));
        oracle.push_vision(Ok(None));
        let page = MockPage::with_elements(candidates.clone());
        let resolver = AddressResolver::new(oracle, 35);
        runs.push(resolver.resolve(page.as_ref(), &intent).await.unwrap());
    }

    assert_eq!(runs[0].provenance, Provenance::Heuristic);
    assert_eq!(runs[0], runs[1]);
    assert!(!runs[0].addresses.contains(&"#c".to_string()));
}

#[tokio::test]
async fn checkout_now_scenario_resolves_heuristically() {
    let oracle = Arc::new(MockOracle::new());
    oracle.push_addresses(Ok(vec![]));
    let page = MockPage::with_elements(vec![
        element("Checkout Now", "#a"),
        element("Continue Shopping", "#b"),
    ]);
    let resolver = AddressResolver::new(oracle, 35);

    let outcome = resolver
        .resolve(page.as_ref(), &Intent::new("checkout"))
        .await
        .unwrap();
    assert_eq!(outcome.provenance, Provenance::Heuristic);
    assert_eq!(outcome.addresses, vec!["#a"]);
}

#[tokio::test]
async fn overlay_suppression_respects_pass_bound() {
    let max_depth = 3;
    let oracle = Arc::new(MockOracle::new());
    // An adversarial page that respawns its popup after every close;
    // keyword fallback keeps finding the dismiss button.
    let page = MockPage::new(MockPageState {
        persistent_obstructions: vec![element("newsletter", "#nl")],
        elements: vec![{
            let mut e = element("No thanks", "#dismiss");
            e.classes = "popup__dismiss".into();
            e
        }],
        ..Default::default()
    });
    let suppressor = OverlaySuppressor::new(oracle, max_depth);

    let report = suppressor
        .suppress(&[page.clone() as Arc<dyn cdp_driver::PageSession>])
        .await;

    assert_eq!(report.passes, max_depth);
    assert!(report.residual);
    // Pass bound + at most one residual confirmation scan.
    assert!(page.state.lock().unwrap().obstruction_scans <= max_depth + 1);
}

#[tokio::test]
async fn overlay_suppression_is_silent_on_clean_pages() {
    let oracle = Arc::new(MockOracle::new());
    let page = MockPage::new(MockPageState {
        obstruction_passes: VecDeque::from(vec![vec![]]),
        ..Default::default()
    });
    let suppressor = OverlaySuppressor::new(oracle.clone(), 3);

    let report = suppressor
        .suppress(&[page as Arc<dyn cdp_driver::PageSession>])
        .await;
    assert_eq!(report.passes, 0);
    assert!(oracle.calls().is_empty());
}
