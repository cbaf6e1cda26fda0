//! Overlay suppression: clear popups, modals and consent banners from
//! every open page before a step acts.
//!
//! Suppression runs as a bounded pass loop. Each pass rescans for
//! obstructions, asks the oracle for close actions (falling back to
//! keyword and stock close selectors) and clicks them. Sites that
//! respawn an overlay on every dismissal would otherwise loop forever;
//! the pass bound guarantees forward progress instead.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use cartprobe_core_types::ElementDescriptor;
use cdp_driver::PageSession;
use oracle_client::{CloseAction, SuggestionOracle};

/// Dismiss-affordance keywords matched against overlay elements.
const DISMISS_KEYWORDS: [&str; 10] = [
    "close",
    "dismiss",
    "no thanks",
    "not now",
    "maybe later",
    "got it",
    "accept",
    "reject",
    "skip",
    "\u{d7}", // the multiplication-sign glyph sites use as an X
];

/// Stock close selectors tried blind when nothing else matched.
const STOCK_CLOSE_SELECTORS: [&str; 6] = [
    "[aria-label=\"Close\"]",
    "[aria-label=\"close\"]",
    ".modal-close",
    ".popup-close",
    "button.close",
    "[data-dismiss]",
];

/// What one suppression run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SuppressionReport {
    /// Passes that saw at least one obstruction.
    pub passes: u32,
    /// Dismiss clicks that landed.
    pub dismissed: u32,
    /// Obstructions still visible when the pass bound was reached.
    pub residual: bool,
}

pub struct OverlaySuppressor {
    oracle: Arc<dyn SuggestionOracle>,
    max_passes: u32,
}

impl OverlaySuppressor {
    pub fn new(oracle: Arc<dyn SuggestionOracle>, max_passes: u32) -> Self {
        Self { oracle, max_passes }
    }

    /// Clear obstructions across all pages. Individual scan and click
    /// failures are swallowed; a broken dismiss button must not kill
    /// the step that follows.
    pub async fn suppress(&self, pages: &[Arc<dyn PageSession>]) -> SuppressionReport {
        let mut report = SuppressionReport::default();

        for pass in 0..self.max_passes {
            let mut obstructed = false;
            let mut clicked_this_pass = 0u32;

            for page in pages {
                let obstructions = match page.obstructions().await {
                    Ok(obstructions) if !obstructions.is_empty() => obstructions,
                    _ => continue,
                };
                obstructed = true;

                let interactive = page.interactive_elements().await.unwrap_or_default();
                let in_overlay: Vec<ElementDescriptor> = interactive
                    .into_iter()
                    .filter(ElementDescriptor::in_overlay_context)
                    .collect();

                for action in self.close_actions(&obstructions, &in_overlay).await {
                    if page.click(&action.selector).await.is_ok() {
                        clicked_this_pass += 1;
                    }
                }
            }

            if !obstructed {
                break;
            }
            report.passes += 1;
            report.dismissed += clicked_this_pass;
            debug!(pass, dismissed = clicked_this_pass, "overlay suppression pass");

            if clicked_this_pass == 0 {
                // Nothing dismissable found; rescanning won't change that.
                break;
            }
            if pass + 1 == self.max_passes {
                report.residual = self.any_obstructed(pages).await;
            }
        }

        report
    }

    async fn any_obstructed(&self, pages: &[Arc<dyn PageSession>]) -> bool {
        for page in pages {
            if let Ok(obstructions) = page.obstructions().await {
                if !obstructions.is_empty() {
                    return true;
                }
            }
        }
        false
    }

    async fn close_actions(
        &self,
        obstructions: &[ElementDescriptor],
        in_overlay: &[ElementDescriptor],
    ) -> Vec<CloseAction> {
        let mut context: Vec<ElementDescriptor> = obstructions.to_vec();
        context.extend(in_overlay.iter().cloned());

        match self.oracle.suggest_dismissals(&context).await {
            Ok(actions) if !actions.is_empty() => actions,
            _ => heuristic_close_actions(in_overlay),
        }
    }
}

/// Keyword-matched dismiss candidates plus the stock selector list.
fn heuristic_close_actions(in_overlay: &[ElementDescriptor]) -> Vec<CloseAction> {
    let mut actions: Vec<CloseAction> = in_overlay
        .iter()
        .filter(|element| {
            let haystack = element.haystack();
            DISMISS_KEYWORDS
                .iter()
                .any(|keyword| haystack.contains(keyword))
        })
        .map(|element| CloseAction {
            selector: element.address.clone(),
            priority: 1,
        })
        .collect();
    actions.extend(STOCK_CLOSE_SELECTORS.iter().map(|selector| CloseAction {
        selector: (*selector).to_string(),
        priority: 2,
    }));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use cdp_driver::mock::{element, MockPage, MockPageState};
    use oracle_client::MockOracle;

    fn overlay_element(text: &str, address: &str) -> ElementDescriptor {
        ElementDescriptor {
            classes: "modal__content".into(),
            ..element(text, address)
        }
    }

    fn as_pages(page: &Arc<MockPage>) -> Vec<Arc<dyn PageSession>> {
        vec![Arc::clone(page) as Arc<dyn PageSession>]
    }

    #[tokio::test]
    async fn clears_in_one_pass_when_overlays_stay_dismissed() {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_dismissals(Ok(vec![CloseAction {
            selector: "#close".into(),
            priority: 1,
        }]));
        let page = MockPage::new(MockPageState {
            obstruction_passes: VecDeque::from(vec![vec![element("popup", "#popup")]]),
            ..Default::default()
        });
        let suppressor = OverlaySuppressor::new(oracle, 3);

        let report = suppressor.suppress(&as_pages(&page)).await;
        assert_eq!(report.passes, 1);
        assert_eq!(report.dismissed, 1);
        assert!(!report.residual);
        assert_eq!(page.state.lock().unwrap().clicks, vec!["#close"]);
    }

    #[tokio::test]
    async fn respawning_overlay_stops_at_pass_bound() {
        let oracle = Arc::new(MockOracle::new());
        for _ in 0..3 {
            oracle.push_dismissals(Ok(vec![CloseAction {
                selector: "#close".into(),
                priority: 1,
            }]));
        }
        // Obstructions persist forever: the queue is empty, so every
        // scan serves the persistent list.
        let page = MockPage::new(MockPageState {
            persistent_obstructions: vec![element("popup", "#popup")],
            ..Default::default()
        });
        let suppressor = OverlaySuppressor::new(oracle, 3);

        let report = suppressor.suppress(&as_pages(&page)).await;
        assert_eq!(report.passes, 3);
        assert!(report.residual);
        assert_eq!(page.state.lock().unwrap().clicks.len(), 3);
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_keyword_dismissal() {
        let oracle = Arc::new(MockOracle::new()); // empty queue: always errs
        let page = MockPage::new(MockPageState {
            obstruction_passes: VecDeque::from(vec![vec![element("newsletter", "#nl")]]),
            elements: vec![
                overlay_element("No thanks", "#no-thanks"),
                element("Checkout", "#co"),
            ],
            ..Default::default()
        });
        let suppressor = OverlaySuppressor::new(oracle, 3);

        let report = suppressor.suppress(&as_pages(&page)).await;
        assert!(report.dismissed >= 1);
        let clicks = page.state.lock().unwrap().clicks.clone();
        assert!(clicks.contains(&"#no-thanks".to_string()));
        assert!(!clicks.contains(&"#co".to_string()));
    }

    #[tokio::test]
    async fn failing_clicks_are_swallowed() {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_dismissals(Ok(vec![
            CloseAction {
                selector: "#broken".into(),
                priority: 1,
            },
            CloseAction {
                selector: "#works".into(),
                priority: 2,
            },
        ]));
        let page = MockPage::new(MockPageState {
            obstruction_passes: VecDeque::from(vec![vec![element("popup", "#popup")]]),
            failing_clicks: ["#broken".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let suppressor = OverlaySuppressor::new(oracle, 3);

        let report = suppressor.suppress(&as_pages(&page)).await;
        assert_eq!(report.dismissed, 1);
    }

    #[tokio::test]
    async fn clean_pages_take_zero_passes() {
        let oracle = Arc::new(MockOracle::new());
        let page = MockPage::with_elements(vec![element("Checkout", "#co")]);
        let suppressor = OverlaySuppressor::new(oracle.clone(), 3);

        let report = suppressor.suppress(&as_pages(&page)).await;
        assert_eq!(report, SuppressionReport::default());
        assert!(oracle.calls().is_empty());
    }
}
