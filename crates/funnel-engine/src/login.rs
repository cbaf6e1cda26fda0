//! Login-wall handling.
//!
//! A page only counts as a wall when it carries a password field or an
//! explicit guest-checkout affordance; ordinary header "Sign in" links
//! must not divert the funnel. The oracle picks the path (guest is
//! always preferred); without an oracle the guest affordance is taken
//! directly. Any interaction failure here is fatal to the run, since
//! rotating the network identity cannot fix a broken login form.

use std::sync::Arc;

use tracing::{debug, info};

use cartprobe_core_types::{ControlDescriptor, ControlKind, ElementDescriptor};
use cdp_driver::PageSession;
use oracle_client::{LoginAdvice, LoginPath, SuggestionOracle};

use crate::config::Credentials;
use crate::errors::EngineFailure;

const GUEST_KEYWORDS: [&str; 4] = [
    "continue as guest",
    "guest checkout",
    "checkout as guest",
    "shop as guest",
];

/// What the login gate concluded for this page.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Not a login wall; proceed.
    NotAWall,
    /// A path through the wall was taken.
    Passed,
}

pub struct LoginHandler {
    oracle: Arc<dyn SuggestionOracle>,
    credentials: Credentials,
}

impl LoginHandler {
    pub fn new(oracle: Arc<dyn SuggestionOracle>, credentials: Credentials) -> Self {
        Self {
            oracle,
            credentials,
        }
    }

    pub async fn pass_wall(&self, page: &dyn PageSession) -> Result<LoginOutcome, EngineFailure> {
        let elements = page.interactive_elements().await.unwrap_or_default();
        let controls = page.form_controls().await.unwrap_or_default();

        if !looks_like_wall(&elements, &controls) {
            return Ok(LoginOutcome::NotAWall);
        }

        match self.oracle.suggest_login(&elements).await {
            Ok(Some(advice)) => {
                info!(path = ?advice.path, reason = %advice.reason, "login wall");
                self.follow(page, &advice, &elements, &controls).await?;
                Ok(LoginOutcome::Passed)
            }
            Ok(None) => Ok(LoginOutcome::NotAWall),
            Err(err) => {
                debug!(%err, "login oracle unavailable, trying guest affordance");
                match guest_affordance(&elements) {
                    Some(address) => {
                        page.click(&address)
                            .await
                            .map_err(|err| EngineFailure::login(err.to_string()))?;
                        Ok(LoginOutcome::Passed)
                    }
                    None => Ok(LoginOutcome::NotAWall),
                }
            }
        }
    }

    async fn follow(
        &self,
        page: &dyn PageSession,
        advice: &LoginAdvice,
        elements: &[ElementDescriptor],
        controls: &[ControlDescriptor],
    ) -> Result<(), EngineFailure> {
        let fail = |err: cdp_driver::DriverError| EngineFailure::login(err.to_string());
        match advice.path {
            LoginPath::Guest => {
                let address = advice
                    .guest_button
                    .clone()
                    .or_else(|| guest_affordance(elements))
                    .ok_or_else(|| EngineFailure::login("guest path without a button"))?;
                page.click(&address).await.map_err(fail)
            }
            LoginPath::Login => {
                let username_field = advice
                    .username_field
                    .clone()
                    .or_else(|| username_control(controls))
                    .ok_or_else(|| EngineFailure::login("no username field"))?;
                let password_field = advice
                    .password_field
                    .clone()
                    .or_else(|| password_control(controls))
                    .ok_or_else(|| EngineFailure::login("no password field"))?;
                let button = advice
                    .login_button
                    .clone()
                    .ok_or_else(|| EngineFailure::login("no login button"))?;

                page.fill(&username_field, &self.credentials.username)
                    .await
                    .map_err(fail)?;
                page.fill(&password_field, &self.credentials.password)
                    .await
                    .map_err(fail)?;
                page.click(&button).await.map_err(fail)
            }
            LoginPath::Social => {
                let button = advice
                    .social_button
                    .clone()
                    .ok_or_else(|| EngineFailure::login("social path without a button"))?;
                page.click(&button).await.map_err(fail)
            }
        }
    }
}

fn looks_like_wall(elements: &[ElementDescriptor], controls: &[ControlDescriptor]) -> bool {
    guest_affordance(elements).is_some() || password_control(controls).is_some()
}

fn guest_affordance(elements: &[ElementDescriptor]) -> Option<String> {
    elements
        .iter()
        .find(|element| {
            let haystack = element.haystack();
            GUEST_KEYWORDS
                .iter()
                .any(|keyword| haystack.contains(keyword))
        })
        .map(|element| element.address.clone())
}

fn password_control(controls: &[ControlDescriptor]) -> Option<String> {
    controls
        .iter()
        .find(|control| {
            control.kind == ControlKind::Text
                && (control.name.to_lowercase().contains("password")
                    || control.autocomplete.contains("current-password")
                    || control.placeholder.to_lowercase().contains("password"))
        })
        .map(|control| control.address.clone())
}

fn username_control(controls: &[ControlDescriptor]) -> Option<String> {
    controls
        .iter()
        .find(|control| {
            let name = control.name.to_lowercase();
            control.kind == ControlKind::Text
                && (name.contains("email")
                    || name.contains("user")
                    || name.contains("login")
                    || control.autocomplete.contains("username"))
        })
        .map(|control| control.address.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_driver::mock::{element, MockPage, MockPageState};
    use oracle_client::MockOracle;

    fn text_control(name: &str, address: &str) -> ControlDescriptor {
        ControlDescriptor {
            kind: ControlKind::Text,
            tag: "input".into(),
            text: String::new(),
            aria_label: String::new(),
            dom_id: String::new(),
            name: name.into(),
            placeholder: String::new(),
            autocomplete: String::new(),
            max_length: None,
            required: false,
            address: address.into(),
            options: Vec::new(),
        }
    }

    #[tokio::test]
    async fn plain_storefront_is_not_a_wall() {
        let oracle = Arc::new(MockOracle::new());
        let handler = LoginHandler::new(oracle.clone(), Credentials::default());
        let page = MockPage::with_elements(vec![element("Sign in", "#signin")]);

        let outcome = handler.pass_wall(page.as_ref()).await.unwrap();
        assert_eq!(outcome, LoginOutcome::NotAWall);
        // The oracle is never consulted for a non-wall.
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn guest_path_is_clicked() {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_login(Ok(Some(LoginAdvice {
            path: LoginPath::Guest,
            reason: "guest checkout offered".into(),
            guest_button: Some("#guest".into()),
            username_field: None,
            password_field: None,
            login_button: None,
            social_button: None,
        })));
        let handler = LoginHandler::new(oracle, Credentials::default());
        let page = MockPage::with_elements(vec![element("Continue as guest", "#guest")]);

        let outcome = handler.pass_wall(page.as_ref()).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Passed);
        assert_eq!(page.state.lock().unwrap().clicks, vec!["#guest"]);
    }

    #[tokio::test]
    async fn credentialed_login_fills_and_submits() {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_login(Ok(Some(LoginAdvice {
            path: LoginPath::Login,
            reason: "no guest option".into(),
            guest_button: None,
            username_field: Some("#email".into()),
            password_field: Some("#pass".into()),
            login_button: Some("#submit".into()),
            social_button: None,
        })));
        let credentials = Credentials {
            username: "probe@example.com".into(),
            password: "hunter2".into(),
        };
        let handler = LoginHandler::new(oracle, credentials);
        let page = MockPage::new(MockPageState {
            controls: vec![text_control("password", "#pass")],
            ..Default::default()
        });

        let outcome = handler.pass_wall(page.as_ref()).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Passed);
        let state = page.state.lock().unwrap();
        assert_eq!(
            state.fills,
            vec![
                ("#email".to_string(), "probe@example.com".to_string()),
                ("#pass".to_string(), "hunter2".to_string()),
            ]
        );
        assert_eq!(state.clicks, vec!["#submit"]);
    }

    #[tokio::test]
    async fn broken_login_interaction_is_fatal() {
        let oracle = Arc::new(MockOracle::new());
        oracle.push_login(Ok(Some(LoginAdvice {
            path: LoginPath::Guest,
            reason: String::new(),
            guest_button: Some("#guest".into()),
            username_field: None,
            password_field: None,
            login_button: None,
            social_button: None,
        })));
        let handler = LoginHandler::new(oracle, Credentials::default());
        let page = MockPage::new(MockPageState {
            elements: vec![element("Continue as guest", "#guest")],
            failing_clicks: ["#guest".to_string()].into_iter().collect(),
            ..Default::default()
        });

        let err = handler.pass_wall(page.as_ref()).await.unwrap_err();
        assert_eq!(err.kind, cartprobe_core_types::FailureKind::Login);
    }
}
