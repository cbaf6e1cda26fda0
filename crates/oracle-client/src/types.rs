//! Validated response shapes the oracle boundary hands to the engine.

use serde::{Deserialize, Serialize};

/// One click target proposed to dismiss an obstruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAction {
    pub selector: String,
    /// 1 is highest.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    99
}

/// Which login path the oracle advises.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginPath {
    Guest,
    Login,
    Social,
}

/// Login strategy advice with the selectors it depends on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginAdvice {
    pub path: LoginPath,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub guest_button: Option<String>,
    #[serde(default)]
    pub username_field: Option<String>,
    #[serde(default)]
    pub password_field: Option<String>,
    #[serde(default)]
    pub login_button: Option<String>,
    #[serde(default)]
    pub social_button: Option<String>,
}

/// How a fill instruction should be applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillKind {
    Select,
    Text,
    Button,
    Radio,
    Checkbox,
}

/// One prerequisite-control instruction from the fill plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillInstruction {
    pub selector: String,
    pub kind: FillKind,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

/// Single-shot vision suggestion. `justification` is mandatory: an
/// address with no supporting rationale is rejected at the boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisionAdvice {
    pub selector: String,
    pub justification: String,
    #[serde(default)]
    pub button_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_action_defaults_priority() {
        let action: CloseAction = serde_json::from_str(r#"{"selector": ".close"}"#).unwrap();
        assert_eq!(action.priority, 99);
    }

    #[test]
    fn fill_kind_kebab() {
        let kind: FillKind = serde_json::from_str("\"select\"").unwrap();
        assert_eq!(kind, FillKind::Select);
        let kind: FillKind = serde_json::from_str("\"checkbox\"").unwrap();
        assert_eq!(kind, FillKind::Checkbox);
    }
}
