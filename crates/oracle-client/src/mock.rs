//! Scripted oracle double for engine and resolver tests.

use std::sync::Mutex;

use async_trait::async_trait;
use std::collections::VecDeque;

use cartprobe_core_types::{ControlDescriptor, ElementDescriptor, Intent};

use crate::errors::OracleError;
use crate::types::{CloseAction, FillInstruction, LoginAdvice, VisionAdvice};
use crate::SuggestionOracle;

/// Oracle whose answers are queued up front. Each call pops one
/// response; an empty queue behaves like a disabled oracle so tests
/// exercise the fall-through path without extra setup.
#[derive(Default)]
pub struct MockOracle {
    address_responses: Mutex<VecDeque<Result<Vec<String>, OracleError>>>,
    dismissal_responses: Mutex<VecDeque<Result<Vec<CloseAction>, OracleError>>>,
    login_responses: Mutex<VecDeque<Result<Option<LoginAdvice>, OracleError>>>,
    fill_responses: Mutex<VecDeque<Result<Vec<FillInstruction>, OracleError>>>,
    vision_responses: Mutex<VecDeque<Result<Option<VisionAdvice>, OracleError>>>,
    /// Candidate-set sizes observed by `suggest_addresses`, for
    /// asserting the caller's cap.
    address_call_sizes: Mutex<Vec<usize>>,
    calls: Mutex<Vec<String>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_addresses(&self, response: Result<Vec<String>, OracleError>) {
        self.address_responses.lock().unwrap().push_back(response);
    }

    pub fn push_dismissals(&self, response: Result<Vec<CloseAction>, OracleError>) {
        self.dismissal_responses.lock().unwrap().push_back(response);
    }

    pub fn push_login(&self, response: Result<Option<LoginAdvice>, OracleError>) {
        self.login_responses.lock().unwrap().push_back(response);
    }

    pub fn push_fill(&self, response: Result<Vec<FillInstruction>, OracleError>) {
        self.fill_responses.lock().unwrap().push_back(response);
    }

    pub fn push_vision(&self, response: Result<Option<VisionAdvice>, OracleError>) {
        self.vision_responses.lock().unwrap().push_back(response);
    }

    /// Method names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Candidate counts passed to each `suggest_addresses` call.
    pub fn address_call_sizes(&self) -> Vec<usize> {
        self.address_call_sizes.lock().unwrap().clone()
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }

    fn exhausted() -> OracleError {
        OracleError::Disabled("mock response queue exhausted".into())
    }
}

#[async_trait]
impl SuggestionOracle for MockOracle {
    async fn suggest_addresses(
        &self,
        candidates: &[ElementDescriptor],
        _intent: &Intent,
    ) -> Result<Vec<String>, OracleError> {
        self.record("suggest_addresses");
        self.address_call_sizes.lock().unwrap().push(candidates.len());
        self.address_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn suggest_dismissals(
        &self,
        _obstructions: &[ElementDescriptor],
    ) -> Result<Vec<CloseAction>, OracleError> {
        self.record("suggest_dismissals");
        self.dismissal_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn suggest_login(
        &self,
        _elements: &[ElementDescriptor],
    ) -> Result<Option<LoginAdvice>, OracleError> {
        self.record("suggest_login");
        self.login_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn suggest_option_fill(
        &self,
        _controls: &[ControlDescriptor],
    ) -> Result<Vec<FillInstruction>, OracleError> {
        self.record("suggest_option_fill");
        self.fill_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn suggest_from_vision(
        &self,
        _screenshot_png: &[u8],
        _markup: &str,
        _intent: &Intent,
    ) -> Result<Option<VisionAdvice>, OracleError> {
        self.record("suggest_from_vision");
        self.vision_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }
}
