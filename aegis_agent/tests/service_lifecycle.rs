//! S5 (graceful stop): with several modules supervised, `Stop` must
//! return promptly without waiting for child exit.

#![cfg(unix)]

use std::time::Duration;

use aegis_agent::service::{AegisService, ServiceHooks};
use aegis_common::prelude::AgentConfig;

#[tokio::test]
async fn graceful_stop_returns_promptly_for_several_modules() {
    let config = AgentConfig {
        modules: vec!["yes".to_string(), "true".to_string(), "false".to_string()],
        log_path: None,
        heartbeat_interval: 1,
    };

    let mut service = AegisService::new();
    service.start(&config);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let stopped_promptly = tokio::time::timeout(Duration::from_secs(2), async {
        service.stop();
    })
    .await;

    assert!(stopped_promptly.is_ok(), "Stop must return within 2s (spec.md S5)");

    // A second Stop (e.g. a duplicate service-control signal) must be
    // a harmless no-op, not a panic or double-release.
    service.stop();
}

#[tokio::test]
async fn install_and_uninstall_are_harmless_no_ops() {
    let mut service = AegisService::new();
    service.install();
    service.uninstall();
}
