//! Gemini-backed implementation of [`SuggestionOracle`].
//!
//! Talks to the `generateContent` REST endpoint. Every answer is pushed
//! through the strict validators in [`crate::parse`] before it reaches
//! the engine; a suggestion the model cannot justify, or that names no
//! known element, is rejected rather than clicked.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use cartprobe_core_types::{ControlDescriptor, ElementDescriptor, Intent};

use crate::errors::OracleError;
use crate::parse;
use crate::types::{CloseAction, FillInstruction, FillKind, LoginAdvice, LoginPath, VisionAdvice};
use crate::SuggestionOracle;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on markup handed to the vision call. Full product pages
/// routinely exceed the request size limit.
const MARKUP_CAP: usize = 60_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Gemini REST client.
pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, OracleError> {
        let url = format!(
            "{BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| OracleError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .map(|detail| detail.message)
                .unwrap_or(body);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| OracleError::Malformed(err.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| {
                content
                    .parts
                    .into_iter()
                    .find_map(|part| part.text.filter(|text| !text.trim().is_empty()))
            })
            .ok_or_else(|| OracleError::Malformed("empty candidate text".into()))
    }

    async fn generate_text(&self, prompt: String) -> Result<String, OracleError> {
        self.generate(vec![Part::Text(prompt)]).await
    }
}

#[async_trait]
impl SuggestionOracle for GeminiOracle {
    async fn suggest_addresses(
        &self,
        candidates: &[ElementDescriptor],
        intent: &Intent,
    ) -> Result<Vec<String>, OracleError> {
        let text = self
            .generate_text(address_prompt(candidates, intent))
            .await?;
        let value = parse::extract_array(&text)
            .ok_or_else(|| OracleError::Malformed("expected a JSON array of selectors".into()))?;
        let addresses = parse::string_array(&value);
        debug!(count = addresses.len(), intent = intent.as_str(), "oracle proposed addresses");
        Ok(addresses)
    }

    async fn suggest_dismissals(
        &self,
        obstructions: &[ElementDescriptor],
    ) -> Result<Vec<CloseAction>, OracleError> {
        let text = self.generate_text(dismissal_prompt(obstructions)).await?;
        let value = parse::extract_object(&text)
            .ok_or_else(|| OracleError::Malformed("expected a JSON object".into()))?;
        parse_dismissals(&value)
    }

    async fn suggest_login(
        &self,
        elements: &[ElementDescriptor],
    ) -> Result<Option<LoginAdvice>, OracleError> {
        let text = self.generate_text(login_prompt(elements)).await?;
        let value = parse::extract_object(&text)
            .ok_or_else(|| OracleError::Malformed("expected a JSON object".into()))?;
        parse_login(&value)
    }

    async fn suggest_option_fill(
        &self,
        controls: &[ControlDescriptor],
    ) -> Result<Vec<FillInstruction>, OracleError> {
        let text = self.generate_text(fill_prompt(controls)).await?;
        let value = parse::extract_object(&text)
            .ok_or_else(|| OracleError::Malformed("expected a JSON object".into()))?;
        parse_fill_plan(&value)
    }

    async fn suggest_from_vision(
        &self,
        screenshot_png: &[u8],
        markup: &str,
        intent: &Intent,
    ) -> Result<Option<VisionAdvice>, OracleError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(screenshot_png);
        let parts = vec![
            Part::Text(vision_prompt(markup, intent)),
            Part::InlineData(InlineData {
                mime_type: "image/png".into(),
                data: encoded,
            }),
        ];
        let text = self.generate(parts).await?;
        let value = parse::extract_object(&text)
            .ok_or_else(|| OracleError::Malformed("expected a JSON object".into()))?;
        parse_vision(&value)
    }
}

fn describe_elements(elements: &[ElementDescriptor]) -> String {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            format!(
                "{}. <{}> text={:?} aria={:?} id={:?} classes={:?} selector={:?}{}",
                index + 1,
                element.tag,
                element.text,
                element.aria_label,
                element.dom_id,
                element.classes,
                element.address,
                if element.disabled { " [disabled]" } else { "" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_controls(controls: &[ControlDescriptor]) -> String {
    controls
        .iter()
        .enumerate()
        .map(|(index, control)| {
            format!(
                "{}. kind={:?} <{}> text={:?} name={:?} placeholder={:?} required={} selector={:?} options={:?}",
                index + 1,
                control.kind,
                control.tag,
                control.text,
                control.name,
                control.placeholder,
                control.required,
                control.address,
                control.options,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn address_prompt(candidates: &[ElementDescriptor], intent: &Intent) -> String {
    format!(
        "You are helping automate an e-commerce purchase flow.\n\
         Goal: find the element that performs the action \"{}\".\n\n\
         Interactive elements currently on the page:\n{}\n\n\
         Reply with ONLY a JSON array of CSS selectors taken from the\n\
         `selector` field above, best match first, worst last. Include\n\
         only elements that plausibly perform the action. Reply [] if\n\
         none do.",
        intent.as_str(),
        describe_elements(candidates),
    )
}

fn dismissal_prompt(obstructions: &[ElementDescriptor]) -> String {
    format!(
        "A web page is covered by one or more popups, modals or consent\n\
         banners. These elements were found inside the overlays:\n{}\n\n\
         Reply with ONLY a JSON object of the form:\n\
         {{\"closeActions\": [{{\"selector\": \"...\", \"priority\": 1}}]}}\n\
         Each selector must be one of the `selector` values above and\n\
         must close or dismiss an overlay (close buttons, \"no thanks\",\n\
         \"accept cookies\", X icons). priority 1 is tried first.\n\
         Reply {{\"closeActions\": []}} if nothing should be clicked.",
        describe_elements(obstructions),
    )
}

fn login_prompt(elements: &[ElementDescriptor]) -> String {
    format!(
        "A purchase flow hit a login or account wall. These interactive\n\
         elements are on the page:\n{}\n\n\
         Decide the cheapest way past it. Reply with ONLY a JSON object:\n\
         {{\"loginStrategy\": {{\"type\": \"guest\"|\"login\"|\"social\",\n\
           \"reason\": \"...\",\n\
           \"selectors\": {{\"guestButton\": null, \"usernameField\": null,\n\
             \"passwordField\": null, \"loginButton\": null,\n\
             \"socialButton\": null}}}}}}\n\
         Prefer \"guest\" whenever a guest-checkout path exists. Every\n\
         selector must come from the `selector` values above. Reply\n\
         {{\"loginStrategy\": null}} if this is not a login wall.",
        describe_elements(elements),
    )
}

fn fill_prompt(controls: &[ControlDescriptor]) -> String {
    format!(
        "A purchase action is blocked until some product options or\n\
         form controls are satisfied. The controls:\n{}\n\n\
         Reply with ONLY a JSON object:\n\
         {{\"fields\": [{{\"selector\": \"...\", \"kind\": \"select\"|\"text\"|\"button\"|\"radio\"|\"checkbox\",\n\
           \"value\": \"...\", \"priority\": 1}}]}}\n\
         For kind \"select\" the value is the visible option label to\n\
         pick. For \"text\" it is the text to type. \"button\", \"radio\"\n\
         and \"checkbox\" need no value. Use only the `selector` values\n\
         above and fill required controls first (priority 1).",
        describe_controls(controls),
    )
}

fn vision_prompt(markup: &str, intent: &Intent) -> String {
    let mut cap = MARKUP_CAP.min(markup.len());
    while !markup.is_char_boundary(cap) {
        cap -= 1;
    }
    let capped = &markup[..cap];
    format!(
        "Attached is a full-page screenshot of an e-commerce page. The\n\
         goal is the action \"{}\", but no matching element was found by\n\
         other means. Study the screenshot and the (truncated) HTML\n\
         below, then name ONE element to click.\n\n\
         Reply with ONLY a JSON object:\n\
         {{\"selector\": \"...\", \"buttonText\": \"...\",\n\
           \"justification\": \"what you see in the screenshot that makes\n\
           this the right element\"}}\n\
         The justification is mandatory; an answer without one is\n\
         discarded. Reply {{\"selector\": null}} if no element fits.\n\n\
         HTML:\n{}",
        intent.as_str(),
        capped,
    )
}

fn parse_dismissals(value: &Value) -> Result<Vec<CloseAction>, OracleError> {
    let raw = value
        .get("closeActions")
        .or_else(|| value.get("close_actions"))
        .ok_or_else(|| OracleError::Malformed("missing closeActions".into()))?;
    let items = raw
        .as_array()
        .ok_or_else(|| OracleError::Malformed("closeActions is not an array".into()))?;

    let mut actions = Vec::new();
    for item in items {
        match serde_json::from_value::<CloseAction>(item.clone()) {
            Ok(action) if !action.selector.trim().is_empty() => actions.push(action),
            Ok(_) => warn!("dropping close action with empty selector"),
            Err(err) => warn!(%err, "dropping malformed close action"),
        }
    }
    actions.sort_by_key(|action| action.priority);
    Ok(actions)
}

fn parse_login(value: &Value) -> Result<Option<LoginAdvice>, OracleError> {
    let strategy = match value.get("loginStrategy").or_else(|| value.get("login_strategy")) {
        Some(Value::Null) | None => return Ok(None),
        Some(strategy) => strategy,
    };
    let path = match strategy.get("type").and_then(Value::as_str) {
        Some("guest") => LoginPath::Guest,
        Some("login") => LoginPath::Login,
        Some("social") => LoginPath::Social,
        Some(other) => {
            return Err(OracleError::Malformed(format!(
                "unknown login strategy {other:?}"
            )))
        }
        None => return Err(OracleError::Malformed("login strategy has no type".into())),
    };
    let selectors = strategy.get("selectors").cloned().unwrap_or(Value::Null);
    let field = |key: &str| {
        selectors
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|selector| !selector.trim().is_empty())
    };
    Ok(Some(LoginAdvice {
        path,
        reason: strategy
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        guest_button: field("guestButton"),
        username_field: field("usernameField"),
        password_field: field("passwordField"),
        login_button: field("loginButton"),
        social_button: field("socialButton"),
    }))
}

fn parse_fill_plan(value: &Value) -> Result<Vec<FillInstruction>, OracleError> {
    let items = value
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| OracleError::Malformed("missing fields array".into()))?;

    let mut plan = Vec::new();
    for item in items {
        let selector = match item.get("selector").and_then(Value::as_str) {
            Some(selector) if !selector.trim().is_empty() => selector.to_string(),
            _ => {
                warn!("dropping fill instruction with no selector");
                continue;
            }
        };
        let kind = match item.get("kind").and_then(Value::as_str) {
            Some("select") | Some("select-one") => FillKind::Select,
            Some("text") => FillKind::Text,
            Some("button") => FillKind::Button,
            Some("radio") => FillKind::Radio,
            Some("checkbox") => FillKind::Checkbox,
            other => {
                warn!(?other, "dropping fill instruction with unknown kind");
                continue;
            }
        };
        plan.push(FillInstruction {
            selector,
            kind,
            value: item
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_string),
            priority: item
                .get("priority")
                .and_then(Value::as_u64)
                .map(|priority| priority as u32)
                .unwrap_or(99),
        });
    }
    plan.sort_by_key(|instruction| instruction.priority);
    Ok(plan)
}

fn parse_vision(value: &Value) -> Result<Option<VisionAdvice>, OracleError> {
    let selector = match value.get("selector") {
        Some(Value::String(selector)) if !selector.trim().is_empty() => selector.clone(),
        Some(Value::Null) | None => return Ok(None),
        Some(_) => return Err(OracleError::Malformed("selector is not a string".into())),
    };
    let justification = value
        .get("justification")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if justification.is_empty() {
        return Err(OracleError::Malformed(
            "vision suggestion carries no justification".into(),
        ));
    }
    Ok(Some(VisionAdvice {
        selector,
        justification: justification.to_string(),
        button_text: value
            .get("buttonText")
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}
