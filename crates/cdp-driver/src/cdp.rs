//! chromiumoxide-backed implementation of the driver boundary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use cartprobe_core_types::{ControlDescriptor, EgressIdentity, ElementDescriptor};

use crate::errors::DriverError;
use crate::inject;
use crate::{BrowserDriver, BrowserSession, LaunchOptions, PageSession};

const EVAL_TIMEOUT: Duration = Duration::from_secs(10);
const VISIBILITY_POLL: Duration = Duration::from_millis(250);

/// Launches one Chromium process per session, proxied through the
/// attempt's egress identity.
#[derive(Debug, Default)]
pub struct CdpDriver;

impl CdpDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn launch(
        &self,
        identity: &EgressIdentity,
        options: &LaunchOptions,
    ) -> Result<Arc<dyn BrowserSession>, DriverError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &identity.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            builder = builder.chrome_executable(chrome_bin);
        }
        let config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("initial page: {e}")))?;

        if !identity.user_agent.is_empty() {
            page.set_user_agent(identity.user_agent.clone())
                .await
                .map_err(|e| DriverError::Launch(format!("user agent override: {e}")))?;
        }

        let session = CdpBrowserSession {
            browser: Mutex::new(Some(browser)),
            main: page.clone(),
            requests: Arc::new(std::sync::Mutex::new(Vec::new())),
            tapped: Mutex::new(HashSet::new()),
            handler_task: Mutex::new(Some(handler_task)),
        };
        session.tap_page(&page).await;

        Ok(Arc::new(session))
    }
}

/// One Chromium process plus its request tap.
pub struct CdpBrowserSession {
    browser: Mutex<Option<Browser>>,
    main: Page,
    /// URLs of outbound requests seen on tapped pages.
    requests: Arc<std::sync::Mutex<Vec<String>>>,
    /// Target ids already wired to the request tap.
    tapped: Mutex<HashSet<String>>,
    handler_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CdpBrowserSession {
    /// Subscribe the request tap on a page exactly once.
    async fn tap_page(&self, page: &Page) {
        let target = format!("{:?}", page.target_id());
        {
            let mut tapped = self.tapped.lock().await;
            if !tapped.insert(target) {
                return;
            }
        }
        match page.event_listener::<EventRequestWillBeSent>().await {
            Ok(mut events) => {
                let sink = Arc::clone(&self.requests);
                tokio::spawn(async move {
                    while let Some(event) = events.next().await {
                        if let Ok(mut urls) = sink.lock() {
                            urls.push(event.request.url.clone());
                        }
                    }
                });
            }
            Err(e) => warn!("request tap unavailable: {}", e),
        }
    }
}

#[async_trait]
impl BrowserSession for CdpBrowserSession {
    async fn pages(&self) -> Result<Vec<Arc<dyn PageSession>>, DriverError> {
        let browser = self.browser.lock().await;
        let browser = browser
            .as_ref()
            .ok_or_else(|| DriverError::Closed("session already closed".into()))?;

        let mut out: Vec<Arc<dyn PageSession>> = vec![Arc::new(CdpPage {
            page: self.main.clone(),
        })];

        let all = browser
            .pages()
            .await
            .map_err(|e| DriverError::Closed(e.to_string()))?;
        let main_target = self.main.target_id().clone();
        for page in all {
            if *page.target_id() == main_target {
                continue;
            }
            self.tap_page(&page).await;
            out.push(Arc::new(CdpPage { page }));
        }
        Ok(out)
    }

    async fn observed_requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    async fn close(&self) -> Result<(), DriverError> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            browser
                .close()
                .await
                .map_err(|e| DriverError::Closed(e.to_string()))?;
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}

/// One live page handle.
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    /// Evaluate an expression and deserialize its JSON result, bounded
    /// by `EVAL_TIMEOUT` so a dialog-blocked page cannot stall a step.
    async fn eval_json<T: DeserializeOwned>(&self, expression: String) -> Result<T, DriverError> {
        let evaluated = tokio::time::timeout(EVAL_TIMEOUT, self.page.evaluate(expression))
            .await
            .map_err(|_| DriverError::Timeout("evaluation timed out".into()))?
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        evaluated
            .into_value::<T>()
            .map_err(|e| DriverError::Evaluation(format!("result decode: {e}")))
    }
}

#[async_trait]
impl PageSession for CdpPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| DriverError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| DriverError::Navigation(e.to_string()))?;
            Ok::<(), DriverError>(())
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| DriverError::Timeout(format!("navigation to {url} timed out")))?
    }

    async fn url(&self) -> Result<String, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn interactive_elements(&self) -> Result<Vec<ElementDescriptor>, DriverError> {
        self.eval_json(inject::interactive_elements_expr()).await
    }

    async fn obstructions(&self) -> Result<Vec<ElementDescriptor>, DriverError> {
        self.eval_json(inject::obstructions_expr()).await
    }

    async fn form_controls(&self) -> Result<Vec<ControlDescriptor>, DriverError> {
        self.eval_json(inject::form_controls_expr()).await
    }

    async fn wait_visible(&self, address: &str, timeout: Duration) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let visible: bool = self.eval_json(inject::visible_expr(address)).await?;
            if visible {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(VISIBILITY_POLL).await;
        }
    }

    async fn is_disabled(&self, address: &str) -> Result<bool, DriverError> {
        self.eval_json(inject::disabled_expr(address)).await
    }

    async fn click(&self, address: &str) -> Result<(), DriverError> {
        // Element-handle click first (scrolls into view, real mouse
        // event); synthetic click as fallback.
        match self.page.find_element(address).await {
            Ok(element) => {
                if element.click().await.is_ok() {
                    return Ok(());
                }
            }
            Err(e) => debug!("find_element('{}') failed: {}", address, e),
        }
        let clicked: bool = self.eval_json(inject::click_expr(address)).await?;
        if clicked {
            Ok(())
        } else {
            Err(DriverError::Interaction {
                address: address.to_string(),
                reason: "element not found".into(),
            })
        }
    }

    async fn fill(&self, address: &str, value: &str) -> Result<(), DriverError> {
        let element =
            self.page
                .find_element(address)
                .await
                .map_err(|e| DriverError::Interaction {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Interaction {
                address: address.to_string(),
                reason: format!("focus: {e}"),
            })?;
        element
            .type_str(value)
            .await
            .map_err(|e| DriverError::Interaction {
                address: address.to_string(),
                reason: format!("type: {e}"),
            })?;
        Ok(())
    }

    async fn select_by_label(&self, address: &str, label: &str) -> Result<(), DriverError> {
        let selected: bool = self
            .eval_json(inject::select_by_label_expr(address, label))
            .await?;
        if selected {
            Ok(())
        } else {
            Err(DriverError::Interaction {
                address: address.to_string(),
                reason: format!("no option matching '{label}'"),
            })
        }
    }

    async fn set_checked(&self, address: &str) -> Result<(), DriverError> {
        let checked: bool = self.eval_json(inject::set_checked_expr(address)).await?;
        if checked {
            Ok(())
        } else {
            Err(DriverError::Interaction {
                address: address.to_string(),
                reason: "could not check control".into(),
            })
        }
    }

    async fn screenshot_full(&self) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))
    }

    async fn markup(&self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn visible_text(&self) -> Result<String, DriverError> {
        self.eval_json(inject::VISIBLE_TEXT_EXPR.to_string()).await
    }

    async fn script_sources(&self) -> Result<Vec<String>, DriverError> {
        self.eval_json(inject::SCRIPT_SOURCES_EXPR.to_string())
            .await
    }

    async fn iframe_sources(&self) -> Result<Vec<String>, DriverError> {
        self.eval_json(inject::IFRAME_SOURCES_EXPR.to_string())
            .await
    }
}
