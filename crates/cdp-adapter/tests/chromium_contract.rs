//! Contract tests for the Chromium environment. They need Chrome/Chromium on the
//! host and are ignored by default.

use std::env;

use cdp_adapter::{CdpConfig, ChromiumEnvironment, LiveEnvironment};

fn contract_enabled() -> bool {
    env::var("RETRACE_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

const FORM_PAGE: &str = "data:text/html,<input id='email' type='text'><input id='pw' type='password' value='secret'><button id='go'>Go</button>";

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RETRACE_CDP_CONTRACT=1"]
async fn contract_probe_and_type() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (RETRACE_CDP_CONTRACT not enabled)");
        return;
    }

    let cfg = CdpConfig {
        headless: true,
        ..CdpConfig::default()
    };
    let env = ChromiumEnvironment::start(&cfg).await.expect("start chromium");
    env.navigate(FORM_PAGE).await.expect("navigate");

    let probe = env.probe("#email").await.expect("probe").expect("element");
    assert!(probe.is_text_input());
    assert!(probe.visible);
    assert!(env.probe("#missing").await.expect("probe").is_none());

    env.set_value("#email", "user@example.com").await.expect("set value");
    env.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RETRACE_CDP_CONTRACT=1"]
async fn contract_capture_masks_passwords() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (RETRACE_CDP_CONTRACT not enabled)");
        return;
    }

    let cfg = CdpConfig {
        headless: true,
        ..CdpConfig::default()
    };
    let env = ChromiumEnvironment::start(&cfg).await.expect("start chromium");
    env.navigate(FORM_PAGE).await.expect("navigate");

    let dom = env.capture_dom().await.expect("capture");
    let text = dom.to_string();
    assert!(!text.contains("secret"));
    assert!(text.contains("******"));

    env.install_recorder().await.expect("install recorder");
    let events = env
        .drain_recorded()
        .await
        .expect("drain")
        .expect("recorder present");
    assert!(events.iter().any(|event| event["type"] == 2));

    let shot = env.screenshot(40).await.expect("screenshot");
    assert!(shot.starts_with(&[0xff, 0xd8]));
    env.shutdown().await;
}
