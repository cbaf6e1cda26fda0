//! Scriptable driver doubles for offline tests.
//!
//! `MockPage` serves pre-scripted snapshots and records every
//! interaction; `MockDriver` hands out a queue of pre-built sessions,
//! one per launch, and remembers the egress identity of each launch.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cartprobe_core_types::{ControlDescriptor, EgressIdentity, ElementDescriptor};

use crate::errors::DriverError;
use crate::{BrowserDriver, BrowserSession, LaunchOptions, PageSession};

/// Build an interactive element descriptor with the fields tests care
/// about.
pub fn element(text: &str, address: &str) -> ElementDescriptor {
    ElementDescriptor {
        tag: "button".into(),
        text: text.into(),
        aria_label: String::new(),
        dom_id: String::new(),
        classes: String::new(),
        address: address.into(),
        disabled: false,
    }
}

/// Scripted state behind one mock page.
#[derive(Default)]
pub struct MockPageState {
    pub url: String,
    pub elements: Vec<ElementDescriptor>,
    /// Obstruction snapshots served in order, one per scan; once the
    /// queue is drained, `persistent_obstructions` is served forever
    /// (an adversarial page that keeps respawning overlays).
    pub obstruction_passes: VecDeque<Vec<ElementDescriptor>>,
    pub persistent_obstructions: Vec<ElementDescriptor>,
    pub controls: Vec<ControlDescriptor>,
    pub markup: String,
    pub visible_text: String,
    pub scripts: Vec<String>,
    pub iframes: Vec<String>,
    /// Addresses that report as structurally disabled.
    pub disabled: HashSet<String>,
    /// Addresses that never become visible.
    pub hidden: HashSet<String>,
    /// Addresses whose clicks fail.
    pub failing_clicks: HashSet<String>,
    /// When true, any successful fill/select/check clears `disabled`
    /// (prerequisite form state satisfied).
    pub enable_on_remedy: bool,
    pub fail_navigation: bool,

    // Interaction log.
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub selections: Vec<(String, String)>,
    pub checks: Vec<String>,
    pub obstruction_scans: u32,
    pub screenshots: u32,
}

/// Pre-scripted page double.
#[derive(Default)]
pub struct MockPage {
    pub state: Mutex<MockPageState>,
}

impl MockPage {
    pub fn new(state: MockPageState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn with_elements(elements: Vec<ElementDescriptor>) -> Arc<Self> {
        Self::new(MockPageState {
            elements,
            ..Default::default()
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockPageState> {
        self.state.lock().expect("mock page state poisoned")
    }
}

#[async_trait]
impl PageSession for MockPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        let mut state = self.lock();
        if state.fail_navigation {
            return Err(DriverError::Navigation(format!("scripted failure: {url}")));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        Ok(self.lock().url.clone())
    }

    async fn interactive_elements(&self) -> Result<Vec<ElementDescriptor>, DriverError> {
        Ok(self.lock().elements.clone())
    }

    async fn obstructions(&self) -> Result<Vec<ElementDescriptor>, DriverError> {
        let mut state = self.lock();
        state.obstruction_scans += 1;
        match state.obstruction_passes.pop_front() {
            Some(pass) => Ok(pass),
            None => Ok(state.persistent_obstructions.clone()),
        }
    }

    async fn form_controls(&self) -> Result<Vec<ControlDescriptor>, DriverError> {
        Ok(self.lock().controls.clone())
    }

    async fn wait_visible(&self, address: &str, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(!self.lock().hidden.contains(address))
    }

    async fn is_disabled(&self, address: &str) -> Result<bool, DriverError> {
        Ok(self.lock().disabled.contains(address))
    }

    async fn click(&self, address: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.clicks.push(address.to_string());
        if state.failing_clicks.contains(address) {
            return Err(DriverError::Interaction {
                address: address.to_string(),
                reason: "scripted click failure".into(),
            });
        }
        Ok(())
    }

    async fn fill(&self, address: &str, value: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.fills.push((address.to_string(), value.to_string()));
        if state.enable_on_remedy {
            state.disabled.clear();
        }
        Ok(())
    }

    async fn select_by_label(&self, address: &str, label: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state
            .selections
            .push((address.to_string(), label.to_string()));
        if state.enable_on_remedy {
            state.disabled.clear();
        }
        Ok(())
    }

    async fn set_checked(&self, address: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.checks.push(address.to_string());
        if state.enable_on_remedy {
            state.disabled.clear();
        }
        Ok(())
    }

    async fn screenshot_full(&self) -> Result<Vec<u8>, DriverError> {
        let mut state = self.lock();
        state.screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn markup(&self) -> Result<String, DriverError> {
        Ok(self.lock().markup.clone())
    }

    async fn visible_text(&self) -> Result<String, DriverError> {
        Ok(self.lock().visible_text.clone())
    }

    async fn script_sources(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.lock().scripts.clone())
    }

    async fn iframe_sources(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.lock().iframes.clone())
    }
}

/// Session double serving a fixed page list.
pub struct MockBrowserSession {
    pub pages: Vec<Arc<MockPage>>,
    pub requests: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl MockBrowserSession {
    pub fn single(page: Arc<MockPage>) -> Arc<Self> {
        Arc::new(Self {
            pages: vec![page],
            requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn pages(&self) -> Result<Vec<Arc<dyn PageSession>>, DriverError> {
        Ok(self
            .pages
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn PageSession>)
            .collect())
    }

    async fn observed_requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests poisoned").clone()
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver double: hands out pre-built sessions in order, one per
/// launch, and records each launch identity.
#[derive(Default)]
pub struct MockDriver {
    sessions: Mutex<VecDeque<Arc<MockBrowserSession>>>,
    pub launches: Mutex<Vec<EgressIdentity>>,
}

impl MockDriver {
    pub fn new(sessions: Vec<Arc<MockBrowserSession>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn launch_identities(&self) -> Vec<EgressIdentity> {
        self.launches.lock().expect("launches poisoned").clone()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn launch(
        &self,
        identity: &EgressIdentity,
        _options: &LaunchOptions,
    ) -> Result<Arc<dyn BrowserSession>, DriverError> {
        self.launches
            .lock()
            .expect("launches poisoned")
            .push(identity.clone());
        let session = self
            .sessions
            .lock()
            .expect("sessions poisoned")
            .pop_front()
            .ok_or_else(|| DriverError::Launch("mock session queue exhausted".into()))?;
        Ok(session as Arc<dyn BrowserSession>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn obstruction_queue_then_persistent() {
        let page = MockPage::new(MockPageState {
            obstruction_passes: VecDeque::from(vec![vec![element("x", "#close")], vec![]]),
            ..Default::default()
        });
        assert_eq!(page.obstructions().await.unwrap().len(), 1);
        assert_eq!(page.obstructions().await.unwrap().len(), 0);
        // Queue drained: persistent list (empty here) from now on.
        assert_eq!(page.obstructions().await.unwrap().len(), 0);
        assert_eq!(page.lock().obstruction_scans, 3);
    }

    #[tokio::test]
    async fn driver_records_identities() {
        let driver = MockDriver::new(vec![MockBrowserSession::single(MockPage::with_elements(
            vec![],
        ))]);
        let identity = EgressIdentity::direct("UA/1.0");
        driver
            .launch(&identity, &LaunchOptions::default())
            .await
            .unwrap();
        assert_eq!(driver.launch_identities(), vec![identity]);
        assert!(driver
            .launch(&EgressIdentity::direct("UA/2.0"), &LaunchOptions::default())
            .await
            .is_err());
    }
}
