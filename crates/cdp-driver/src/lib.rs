//! Browser driver boundary for cartprobe.
//!
//! The engine consumes the browser as an opaque capability: navigate,
//! snapshot interactive elements, click/fill/select at an address,
//! capture screenshots and markup. `BrowserDriver` / `BrowserSession` /
//! `PageSession` are the seams; `CdpDriver` is the chromiumoxide-backed
//! implementation and `mock` provides scriptable doubles for tests.

pub mod cdp;
pub mod errors;
pub mod inject;
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use cartprobe_core_types::{ControlDescriptor, EgressIdentity, ElementDescriptor};

pub use cdp::CdpDriver;
pub use errors::DriverError;

/// Options applied when a browser session is launched.
#[derive(Clone, Debug)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Default navigation timeout.
    pub page_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            page_timeout: Duration::from_millis(35_000),
        }
    }
}

/// One open page (tab or pop-up window) within a session.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load a URL, waiting for the document to be ready.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Current page URL.
    async fn url(&self) -> Result<String, DriverError>;

    /// Snapshot all visible interactive elements (buttons, links,
    /// submit inputs) with structural addresses.
    async fn interactive_elements(&self) -> Result<Vec<ElementDescriptor>, DriverError>;

    /// Snapshot all visible obstruction-shaped elements (dialogs,
    /// modals, drawers, cookie banners).
    async fn obstructions(&self) -> Result<Vec<ElementDescriptor>, DriverError>;

    /// Snapshot all visible form/selection controls.
    async fn form_controls(&self) -> Result<Vec<ControlDescriptor>, DriverError>;

    /// Poll until the element at `address` is visible or the timeout
    /// elapses. Returns whether it became visible.
    async fn wait_visible(&self, address: &str, timeout: Duration) -> Result<bool, DriverError>;

    /// Whether the element at `address` is structurally disabled.
    async fn is_disabled(&self, address: &str) -> Result<bool, DriverError>;

    async fn click(&self, address: &str) -> Result<(), DriverError>;

    /// Focus the element at `address` and type `value` into it.
    async fn fill(&self, address: &str, value: &str) -> Result<(), DriverError>;

    /// Select the option whose label contains `label` (case-insensitive).
    async fn select_by_label(&self, address: &str, label: &str) -> Result<(), DriverError>;

    /// Ensure a checkbox/radio at `address` is checked.
    async fn set_checked(&self, address: &str) -> Result<(), DriverError>;

    /// Full-page PNG screenshot.
    async fn screenshot_full(&self) -> Result<Vec<u8>, DriverError>;

    /// Current document markup.
    async fn markup(&self) -> Result<String, DriverError>;

    /// Visible body text.
    async fn visible_text(&self) -> Result<String, DriverError>;

    /// `src` of every script element.
    async fn script_sources(&self) -> Result<Vec<String>, DriverError>;

    /// `src` of every iframe element.
    async fn iframe_sources(&self) -> Result<Vec<String>, DriverError>;
}

/// One live browser context bound to a single egress identity.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// All currently open pages, foreground page first. Pop-up payment
    /// windows appear here as additional entries.
    async fn pages(&self) -> Result<Vec<Arc<dyn PageSession>>, DriverError>;

    /// URLs of outbound network requests observed so far.
    async fn observed_requests(&self) -> Vec<String>;

    /// Tear the session down. Safe to call more than once.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Factory for browser sessions; one session per retry attempt.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(
        &self,
        identity: &EgressIdentity,
        options: &LaunchOptions,
    ) -> Result<Arc<dyn BrowserSession>, DriverError>;
}
