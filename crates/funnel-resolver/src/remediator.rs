//! Option remediation: satisfy prerequisite product options so a
//! disabled action button becomes clickable.
//!
//! Triggered only when the resolved element is structurally disabled.
//! The oracle proposes a fill plan over the visible form controls;
//! without one, a default plan picks the first real option of each
//! select, checks required radios and clicks the first swatch of each
//! group. Instructions that fail are skipped, never fatal.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use cartprobe_core_types::{ControlDescriptor, ControlKind};
use cdp_driver::PageSession;
use oracle_client::{FillInstruction, FillKind, SuggestionOracle};

/// What one remediation run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemediationReport {
    pub attempted: u32,
    pub applied: u32,
}

impl RemediationReport {
    /// Whether the caller should re-check the blocked element.
    pub fn changed_anything(&self) -> bool {
        self.applied > 0
    }
}

pub struct OptionRemediator {
    oracle: Arc<dyn SuggestionOracle>,
}

impl OptionRemediator {
    pub fn new(oracle: Arc<dyn SuggestionOracle>) -> Self {
        Self { oracle }
    }

    /// Try to satisfy the page's prerequisite controls.
    pub async fn remediate(&self, page: &dyn PageSession) -> RemediationReport {
        let controls = page.form_controls().await.unwrap_or_default();
        if controls.is_empty() {
            return RemediationReport::default();
        }

        let plan = match self.oracle.suggest_option_fill(&controls).await {
            Ok(plan) if !plan.is_empty() => plan,
            _ => default_plan(&controls),
        };

        let mut report = RemediationReport::default();
        for instruction in plan {
            report.attempted += 1;
            let applied = match instruction.kind {
                FillKind::Select => match &instruction.value {
                    Some(label) => page
                        .select_by_label(&instruction.selector, label)
                        .await
                        .is_ok(),
                    None => false,
                },
                FillKind::Text => match &instruction.value {
                    Some(value) => page.fill(&instruction.selector, value).await.is_ok(),
                    None => false,
                },
                FillKind::Button => page.click(&instruction.selector).await.is_ok(),
                FillKind::Radio | FillKind::Checkbox => {
                    page.set_checked(&instruction.selector).await.is_ok()
                }
            };
            if applied {
                report.applied += 1;
            } else {
                debug!(selector = %instruction.selector, "fill instruction skipped");
            }
        }
        report
    }
}

/// Oracle-less plan: first real option of each select, required radios
/// and checkboxes checked, one swatch clicked.
fn default_plan(controls: &[ControlDescriptor]) -> Vec<FillInstruction> {
    let mut plan = Vec::new();
    let mut swatch_clicked = false;

    for control in controls {
        match control.kind {
            ControlKind::Select => {
                // options[0] is almost always a "Select size" placeholder.
                let label = control
                    .options
                    .iter()
                    .skip(1)
                    .find(|label| !label.trim().is_empty())
                    .or_else(|| control.options.first());
                if let Some(label) = label {
                    plan.push(FillInstruction {
                        selector: control.address.clone(),
                        kind: FillKind::Select,
                        value: Some(label.clone()),
                        priority: 1,
                    });
                }
            }
            ControlKind::Radio | ControlKind::Checkbox if control.required => {
                plan.push(FillInstruction {
                    selector: control.address.clone(),
                    kind: FillKind::Radio,
                    value: None,
                    priority: 1,
                });
            }
            ControlKind::Swatch if !swatch_clicked => {
                swatch_clicked = true;
                plan.push(FillInstruction {
                    selector: control.address.clone(),
                    kind: FillKind::Button,
                    value: None,
                    priority: 2,
                });
            }
            _ => {}
        }
    }
    plan
}
