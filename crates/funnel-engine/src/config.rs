//! Engine configuration.
//!
//! Defaults mirror field experience with real storefronts: a 35 second
//! page timeout, two retries, a visible window (many bot walls trigger
//! on headless fingerprints) and a slight inter-action delay.

use serde::{Deserialize, Serialize};

/// Synthetic shopper identity used by checkout autofill.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Default for TestData {
    fn default() -> Self {
        Self {
            name: "Arjun Mehta".into(),
            email: "arjun.mehta.test@example.com".into(),
            phone: "9876543210".into(),
            address: "221B MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            zip: "560001".into(),
        }
    }
}

/// Credentials for sites that force a credentialed login.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Navigation timeout per page load, in milliseconds.
    pub page_timeout_ms: u64,
    /// Additional attempts after the first (identity rotation).
    pub max_retries: u32,
    pub headless: bool,
    /// Settle delay after each interaction, in milliseconds.
    pub action_delay_ms: u64,
    pub evidence_dir: String,
    /// Cap on candidates offered to the oracle per resolution.
    pub max_elements: usize,
    /// Overlay suppression pass bound.
    pub overlay_max_depth: u32,
    /// Wall-clock ceiling for the whole run, in milliseconds.
    pub global_budget_ms: u64,
    /// Proxy endpoints; empty means direct only.
    pub proxies: Vec<String>,
    /// User agents paired randomly with identities.
    pub user_agents: Vec<String>,
    /// Report webhook endpoint.
    pub report_url: Option<String>,
    /// Whether a bot challenge rotates identity (true) or ends the run
    /// (false, for IP-independent bot walls).
    pub captcha_rotates: bool,
    /// When the pool is exhausted, reuse failed identities instead of
    /// concluding all-proxy-failed.
    pub reuse_exhausted_proxies: bool,
    pub test_data: TestData,
    pub credentials: Credentials,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_timeout_ms: 35_000,
            max_retries: 2,
            headless: false,
            action_delay_ms: 100,
            evidence_dir: "./evidence".into(),
            max_elements: 35,
            overlay_max_depth: 3,
            global_budget_ms: 300_000,
            proxies: Vec::new(),
            user_agents: default_user_agents(),
            report_url: None,
            captcha_rotates: true,
            reuse_exhausted_proxies: false,
            test_data: TestData::default(),
            credentials: Credentials::default(),
        }
    }
}

impl EngineConfig {
    pub fn page_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.page_timeout_ms)
    }

    pub fn action_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.action_delay_ms)
    }

    pub fn global_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.global_budget_ms)
    }
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
