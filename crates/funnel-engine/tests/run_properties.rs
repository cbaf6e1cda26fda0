//! End-to-end run properties through the full engine, with the mock
//! driver, oracle, recorder and reporter.

use std::sync::Arc;

use async_trait::async_trait;
use cartprobe_core_types::{
    ControlDescriptor, ControlKind, EgressIdentity, FailureKind, HaltReason, RunStatus,
};
use cdp_driver::mock::{element, MockBrowserSession, MockDriver, MockPage, MockPageState};
use cdp_driver::{BrowserDriver, BrowserSession, DriverError, LaunchOptions};
use evidence_store::{MemoryRecorder, MemoryReporter};
use funnel_engine::{CheckoutEngine, EngineConfig, RunRequest};
use oracle_client::MockOracle;

fn test_config() -> EngineConfig {
    EngineConfig {
        headless: true,
        action_delay_ms: 0,
        ..EngineConfig::default()
    }
}

fn engine_with(driver: Arc<MockDriver>, config: EngineConfig) -> (CheckoutEngine, Arc<MemoryReporter>) {
    let reporter = Arc::new(MemoryReporter::new());
    let engine = CheckoutEngine::new(
        driver,
        Arc::new(MockOracle::new()),
        Arc::new(MemoryRecorder::new()),
        Arc::clone(&reporter) as Arc<dyn evidence_store::RunReporter>,
        config,
    );
    (engine, reporter)
}

fn select_control(address: &str, options: Vec<&str>) -> ControlDescriptor {
    ControlDescriptor {
        kind: ControlKind::Select,
        tag: "select".into(),
        text: String::new(),
        aria_label: String::new(),
        dom_id: String::new(),
        name: "size".into(),
        placeholder: String::new(),
        autocomplete: String::new(),
        max_length: None,
        required: true,
        address: address.into(),
        options: options.into_iter().map(str::to_string).collect(),
    }
}

fn otp_control(address: &str) -> ControlDescriptor {
    ControlDescriptor {
        kind: ControlKind::Text,
        tag: "input".into(),
        text: String::new(),
        aria_label: String::new(),
        dom_id: String::new(),
        name: "otp".into(),
        placeholder: "Enter OTP".into(),
        autocomplete: "one-time-code".into(),
        max_length: Some(6),
        required: true,
        address: address.into(),
        options: Vec::new(),
    }
}

#[tokio::test]
async fn disabled_target_is_remediated_before_any_click() {
    let page = MockPage::new(MockPageState {
        elements: vec![element("Checkout", "#co")],
        controls: vec![select_control("#size", vec!["Choose a size", "M"])],
        disabled: ["#co".to_string()].into_iter().collect(),
        enable_on_remedy: true,
        ..Default::default()
    });
    let driver = Arc::new(MockDriver::new(vec![MockBrowserSession::single(
        Arc::clone(&page),
    )]));
    let (engine, _) = engine_with(Arc::clone(&driver), test_config());

    let result = engine
        .run(RunRequest::new("https://shop.example").with_plan(vec!["checkout".into()]))
        .await;

    assert_eq!(result.status, RunStatus::Success);
    let state = page.state.lock().unwrap();
    // The prerequisite select was satisfied and only then was the
    // target clicked.
    assert_eq!(state.selections, vec![("#size".to_string(), "M".to_string())]);
    assert!(state.clicks.contains(&"#co".to_string()));
}

#[tokio::test]
async fn unremediable_disabled_target_is_never_clicked() {
    let page = MockPage::new(MockPageState {
        elements: vec![element("Checkout", "#co")],
        controls: vec![select_control("#size", vec!["Choose a size", "M"])],
        disabled: ["#co".to_string()].into_iter().collect(),
        enable_on_remedy: false,
        ..Default::default()
    });
    let driver = Arc::new(MockDriver::new(vec![MockBrowserSession::single(
        Arc::clone(&page),
    )]));
    let (engine, _) = engine_with(Arc::clone(&driver), test_config());

    let result = engine
        .run(RunRequest::new("https://shop.example").with_plan(vec!["checkout".into()]))
        .await;

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.failure_kind, Some(FailureKind::NoSelector));
    let state = page.state.lock().unwrap();
    // Remediation was attempted, the disabled target never clicked.
    assert!(!state.selections.is_empty());
    assert!(!state.clicks.contains(&"#co".to_string()));
}

#[tokio::test]
async fn otp_field_halts_instead_of_failing() {
    let page = MockPage::new(MockPageState {
        elements: vec![element("Add to cart", "#atc"), element("Checkout", "#co")],
        controls: vec![otp_control("#otp")],
        ..Default::default()
    });
    let driver = Arc::new(MockDriver::new(vec![MockBrowserSession::single(page)]));
    let (engine, reporter) = engine_with(driver, test_config());

    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert_eq!(result.status, RunStatus::Halted);
    assert_eq!(result.halt_reason, Some(HaltReason::OtpRequired));
    assert_eq!(result.failure_kind, None);

    let reported = reporter.reported();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].status, RunStatus::Halted);
}

#[tokio::test]
async fn captcha_rotates_identity_exactly_once_before_next_attempt() {
    let walled = MockPage::new(MockPageState {
        markup: r#"<div class="g-recaptcha"></div>"#.into(),
        ..Default::default()
    });
    let clean = MockPage::with_elements(vec![
        element("Add to cart", "#atc"),
        element("Checkout", "#co"),
    ]);
    let driver = Arc::new(MockDriver::new(vec![
        MockBrowserSession::single(walled),
        MockBrowserSession::single(clean),
    ]));
    let config = EngineConfig {
        proxies: vec!["http://p1:3128".into(), "http://p2:3128".into()],
        ..test_config()
    };
    let (engine, reporter) = engine_with(Arc::clone(&driver), config);

    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert_eq!(result.status, RunStatus::Success);
    let identities = driver.launch_identities();
    assert_eq!(identities.len(), 2);
    assert_ne!(identities[0].proxy, identities[1].proxy);
    // One intermediate captcha report plus the terminal success.
    let reported = reporter.reported();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].failure_kind, Some(FailureKind::Captcha));
    assert_eq!(reported[1].status, RunStatus::Success);
}

#[tokio::test]
async fn rotated_attempts_continue_step_numbering() {
    use std::collections::HashSet;

    let walled = MockPage::new(MockPageState {
        markup: r#"<div class="g-recaptcha"></div>"#.into(),
        ..Default::default()
    });
    let clean = MockPage::with_elements(vec![
        element("Add to cart", "#atc"),
        element("Checkout", "#co"),
    ]);
    let driver = Arc::new(MockDriver::new(vec![
        MockBrowserSession::single(walled),
        MockBrowserSession::single(clean),
    ]));
    let recorder = Arc::new(MemoryRecorder::new());
    let config = EngineConfig {
        proxies: vec!["http://p1:3128".into(), "http://p2:3128".into()],
        ..test_config()
    };
    let engine = CheckoutEngine::new(
        driver,
        Arc::new(MockOracle::new()),
        Arc::clone(&recorder) as Arc<dyn evidence_store::EvidenceRecorder>,
        Arc::new(MemoryReporter::new()),
        config,
    );

    let result = engine.run(RunRequest::new("https://shop.example")).await;
    assert_eq!(result.status, RunStatus::Success);

    // Both attempts share one run id and one evidence directory: step
    // indices must keep climbing across the rotation, never restart.
    let indices: Vec<u32> = result.log.iter().map(|record| record.index).collect();
    assert!(indices.windows(2).all(|pair| pair[1] > pair[0]), "{indices:?}");

    // No step's evidence was written over by a later attempt.
    let steps: Vec<u32> = recorder
        .screenshot_log()
        .iter()
        .map(|(step, _)| *step)
        .collect();
    let unique: HashSet<u32> = steps.iter().copied().collect();
    assert_eq!(unique.len(), steps.len(), "{steps:?}");
}

#[tokio::test]
async fn captcha_policy_off_makes_bot_wall_fatal() {
    let walled = MockPage::new(MockPageState {
        visible_text: "Checking your browser before accessing".into(),
        ..Default::default()
    });
    let driver = Arc::new(MockDriver::new(vec![MockBrowserSession::single(walled)]));
    let config = EngineConfig {
        captcha_rotates: false,
        proxies: vec!["http://p1:3128".into(), "http://p2:3128".into()],
        ..test_config()
    };
    let (engine, _) = engine_with(Arc::clone(&driver), config);

    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.failure_kind, Some(FailureKind::Captcha));
    assert_eq!(driver.launch_identities().len(), 1);
}

#[tokio::test]
async fn exhausting_the_pool_concludes_all_proxy_failed() {
    let broken = |_: ()| {
        MockBrowserSession::single(MockPage::new(MockPageState {
            fail_navigation: true,
            ..Default::default()
        }))
    };
    let driver = Arc::new(MockDriver::new(vec![broken(()), broken(())]));
    let config = EngineConfig {
        proxies: vec!["http://p1:3128".into(), "http://p2:3128".into()],
        max_retries: 5,
        ..test_config()
    };
    let (engine, _) = engine_with(Arc::clone(&driver), config);

    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.failure_kind, Some(FailureKind::AllProxyFailed));
    // Both identities were tried before exhaustion was declared.
    assert_eq!(driver.launch_identities().len(), 2);
    // The per-attempt navigation failures are in the run log.
    assert!(result
        .log
        .iter()
        .any(|record| record.error.as_deref().unwrap_or("").contains("navigation")));
}

#[tokio::test]
async fn razorpay_script_source_lands_in_detected_gateways() {
    let page = MockPage::new(MockPageState {
        elements: vec![element("Add to cart", "#atc"), element("Checkout", "#co")],
        scripts: vec!["https://checkout.razorpay.com/v1/checkout.js".into()],
        ..Default::default()
    });
    let driver = Arc::new(MockDriver::new(vec![MockBrowserSession::single(page)]));
    let (engine, _) = engine_with(driver, test_config());

    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert_eq!(result.status, RunStatus::Success);
    assert!(result
        .detected_gateways
        .contains(&"Razorpay Checkout".to_string()));
}

/// Driver whose launch never completes, for exercising the global
/// wall-clock budget.
struct HangingDriver;

#[async_trait]
impl BrowserDriver for HangingDriver {
    async fn launch(
        &self,
        _identity: &EgressIdentity,
        _options: &LaunchOptions,
    ) -> Result<Arc<dyn BrowserSession>, DriverError> {
        tokio::time::sleep(std::time::Duration::from_secs(600)).await;
        Err(DriverError::Launch("unreachable".into()))
    }
}

#[tokio::test]
async fn global_budget_preempts_a_hung_attempt() {
    let reporter = Arc::new(MemoryReporter::new());
    let config = EngineConfig {
        global_budget_ms: 50,
        ..test_config()
    };
    let engine = CheckoutEngine::new(
        Arc::new(HangingDriver),
        Arc::new(MockOracle::new()),
        Arc::new(MemoryRecorder::new()),
        Arc::clone(&reporter) as Arc<dyn evidence_store::RunReporter>,
        config,
    );

    let started = std::time::Instant::now();
    let result = engine.run(RunRequest::new("https://shop.example")).await;

    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.failure_kind, Some(FailureKind::Navigation));
    assert_eq!(reporter.reported().len(), 1);
}
