//! Process-level integration tests for `ModuleManager`, exercising it
//! against real child processes (coreutils already present on any
//! Unix test host) instead of a bespoke fixture binary.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;

use aegis_agent::manager::{resolve_executable, ModuleManager};

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn resolve_executable_falls_back_to_path_lookup_for_coreutils() {
    // Nothing under ../modules/true/... or ./true exists in the crate's
    // working directory, so this must fall through to the bare name
    // for the OS to resolve against PATH.
    assert_eq!(resolve_executable("true"), PathBuf::from("true"));
}

/// P1: at most one child per module at any instant. "yes" never exits
/// on its own, so a live pid observed a few hundred ms after start
/// confirms exactly one child was spawned and is still tracked.
#[tokio::test]
async fn at_most_one_child_is_tracked_per_module() {
    let (exit_tx, _) = broadcast::channel(1);
    let mut manager = ModuleManager::new();
    manager.start(&names(&["yes"]), &exit_tx);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let shared = manager.module("yes").expect("module must be tracked after start");
    let pid = *shared.current_pid.lock();
    assert!(pid.is_some(), "yes should still be running");
    assert!(!shared.is_disabled());

    let _ = exit_tx.send(());
    manager.stop();
}

/// S5-like: stopping the manager kills live children and clears all
/// tracked state, and does so promptly (no waiting on child exit).
#[tokio::test]
async fn stop_kills_children_and_clears_tracked_state() {
    let (exit_tx, _) = broadcast::channel(1);
    let mut manager = ModuleManager::new();
    manager.start(&names(&["yes", "true"]), &exit_tx);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopped_promptly = tokio::time::timeout(Duration::from_secs(2), async {
        let _ = exit_tx.send(());
        manager.stop();
    })
    .await;

    assert!(stopped_promptly.is_ok(), "stop() must not block on child exit");
    assert!(manager.module("yes").is_none());
    assert!(manager.module("true").is_none());
}

/// A module whose executable can never be spawned (nonexistent path,
/// not found on PATH either) is recorded as a synthetic crash and
/// keeps retrying under backoff rather than panicking the supervise
/// task (spec.md §9's deliberate "never spawned" / "crashed" conflation).
#[tokio::test]
async fn unresolvable_module_keeps_retrying_without_panicking() {
    let (exit_tx, _) = broadcast::channel(1);
    let mut manager = ModuleManager::new();
    manager.start(&names(&["definitely-not-a-real-binary-xyz"]), &exit_tx);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let shared = manager
        .module("definitely-not-a-real-binary-xyz")
        .expect("module must still be tracked");
    assert!(!shared.is_disabled(), "a single failed spawn must not latch disabled");

    let _ = exit_tx.send(());
    manager.stop();
}

/// An always-instantly-crashing module never panics the supervise task
/// and remains stoppable. (The precise crash-window/backoff latch
/// arithmetic is pinned down deterministically by the unit tests in
/// `manager.rs`, not by wall-clock timing here; see DESIGN.md for the
/// documented tension between the backoff growth rate and the 10s
/// crash window.)
#[tokio::test]
async fn crash_looping_module_remains_stoppable() {
    let (exit_tx, _) = broadcast::channel(1);
    let mut manager = ModuleManager::new();
    manager.start(&names(&["false"]), &exit_tx);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(manager.module("false").is_some());

    let _ = exit_tx.send(());
    manager.stop();
}
