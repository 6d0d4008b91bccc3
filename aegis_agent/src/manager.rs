//! Executable resolution and the per-module supervise-task state
//! machine: `Spawning -> Running -> Exited -> Backoff -> Spawning`,
//! with `Disabled` and `Stopped` as terminal states.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use aegis_common::consts::{BACKOFF_MAX, BACKOFF_MIN, CRASH_MAX, CRASH_WINDOW, UPTIME_RESET};
use aegis_common::error::SpawnError;

use crate::module::{ModuleShared, ModuleState};

#[cfg(windows)]
const EXE_SUFFIX: &str = ".exe";
#[cfg(not(windows))]
const EXE_SUFFIX: &str = "";

/// Resolve a module name to the executable that should be spawned
/// for it.
///
/// Probed in order, relative to the agent's current working
/// directory:
///   1. `../modules/<name>/target/release/<name><suffix>`
///   2. `../modules/<name>/target/debug/<name><suffix>`
///   3. `./<name><suffix>`
///   4. bare `<name>`, left for the OS to resolve against `PATH`
pub fn resolve_executable(name: &str) -> PathBuf {
    let release = PathBuf::from("..")
        .join("modules")
        .join(name)
        .join("target")
        .join("release")
        .join(format!("{name}{EXE_SUFFIX}"));
    if release.exists() {
        return release;
    }

    let debug = PathBuf::from("..")
        .join("modules")
        .join(name)
        .join("target")
        .join("debug")
        .join(format!("{name}{EXE_SUFFIX}"));
    if debug.exists() {
        return debug;
    }

    let local = PathBuf::from(format!("{name}{EXE_SUFFIX}"));
    if local.exists() {
        return local;
    }

    PathBuf::from(name)
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(windows)]
fn kill_pid(pid: u32) {
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
    use winapi::um::winnt::PROCESS_TERMINATE;
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if !handle.is_null() {
            TerminateProcess(handle, 1);
            CloseHandle(handle);
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_pid(_pid: u32) {}

/// Backoff delay for the Nth restart (1-indexed), doubling from
/// `BACKOFF_MIN` and saturating at `BACKOFF_MAX`.
fn backoff_for(restart_count: u32) -> std::time::Duration {
    let exp = restart_count.saturating_sub(1).min(6);
    BACKOFF_MIN
        .checked_mul(1u32 << exp)
        .map(|d| d.min(BACKOFF_MAX))
        .unwrap_or(BACKOFF_MAX)
}

/// Record a crash at `now`, prune to entries within `CRASH_WINDOW`,
/// and report whether the module should latch `disabled` (I5: prune
/// before testing the threshold).
fn record_crash_and_check_loop(crash_timestamps: &mut Vec<Instant>, now: Instant) -> bool {
    crash_timestamps.push(now);
    crash_timestamps.retain(|t| now.duration_since(*t) <= CRASH_WINDOW);
    crash_timestamps.len() as u32 >= CRASH_MAX
}

async fn supervise_task(shared: Arc<ModuleShared>, mut exit_rx: broadcast::Receiver<()>) {
    let mut state = ModuleState::Spawning;
    let mut restart_count: u32 = 0;
    let mut crash_timestamps: Vec<Instant> = Vec::new();
    let mut last_spawn_at = Instant::now();
    let mut child: Option<tokio::process::Child> = None;

    loop {
        match state {
            ModuleState::Spawning => {
                match tokio::process::Command::new(&shared.executable_path)
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(c) => {
                        last_spawn_at = Instant::now();
                        shared.liveness.reset(last_spawn_at);
                        if let Some(pid) = c.id() {
                            *shared.current_pid.lock() = Some(pid);
                            if let Err(e) = shared.governor.lock().apply(pid) {
                                tracing::warn!(module = %shared.name, error = %e, "resource governor apply failed");
                            }
                        }
                        child = Some(c);
                        state = ModuleState::Running;
                    }
                    Err(source) => {
                        let err = SpawnError::Io {
                            module: shared.name.clone(),
                            path: shared.executable_path.clone(),
                            source,
                        };
                        tracing::error!(module = %shared.name, error = %err, "failed to spawn module");
                        state = ModuleState::Exited;
                    }
                }
            }

            ModuleState::Running => {
                let c = child.as_mut().expect("child is Some entering Running");
                tokio::select! {
                    status = c.wait() => {
                        match status {
                            Ok(exit_status) => tracing::warn!(module = %shared.name, status = %exit_status, "module exited"),
                            Err(e) => tracing::error!(module = %shared.name, error = %e, "error waiting on module"),
                        }
                        *shared.current_pid.lock() = None;
                        child = None;
                        state = ModuleState::Exited;
                    }
                    _ = shared.kill_notify.notified() => {
                        tracing::warn!(module = %shared.name, "liveness timeout exceeded, killing module");
                        if let Some(mut c) = child.take() {
                            let _ = c.start_kill();
                            let _ = c.wait().await;
                        }
                        *shared.current_pid.lock() = None;
                        state = ModuleState::Exited;
                    }
                    _ = exit_rx.recv() => {
                        tracing::info!(module = %shared.name, "stop requested, killing module");
                        if let Some(mut c) = child.take() {
                            let _ = c.start_kill();
                            let _ = c.wait().await;
                        }
                        *shared.current_pid.lock() = None;
                        state = ModuleState::Stopped;
                    }
                }
            }

            ModuleState::Exited => {
                let now = Instant::now();
                let uptime = now.duration_since(last_spawn_at);
                if uptime >= UPTIME_RESET {
                    crash_timestamps.clear();
                    restart_count = 0;
                }
                if record_crash_and_check_loop(&mut crash_timestamps, now) {
                    shared.disabled.store(true, Ordering::SeqCst);
                    tracing::error!(module = %shared.name, "crash loop detected, disabling module");
                    state = ModuleState::Disabled;
                } else {
                    restart_count += 1;
                    state = ModuleState::Backoff;
                }
            }

            ModuleState::Backoff => {
                let delay = backoff_for(restart_count);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        state = ModuleState::Spawning;
                    }
                    _ = exit_rx.recv() => {
                        state = ModuleState::Stopped;
                    }
                }
            }

            ModuleState::Disabled | ModuleState::Stopped => break,
        }
    }
}

/// Owns every supervised module's shared state and supervise-task.
pub struct ModuleManager {
    shared: HashMap<String, Arc<ModuleShared>>,
    tasks: HashMap<String, JoinHandle<()>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self {
            shared: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    /// Spawn a supervise-task per module name, each subscribed to its
    /// own clone of `exit_tx`.
    pub fn start(&mut self, modules: &[String], exit_tx: &broadcast::Sender<()>) {
        for name in modules {
            let executable_path = resolve_executable(name);
            let governor = crate::governor::new_governor(name);
            let shared = Arc::new(ModuleShared::new(name.clone(), executable_path, governor));

            let task_shared = Arc::clone(&shared);
            let exit_rx = exit_tx.subscribe();
            let handle = tokio::spawn(supervise_task(task_shared, exit_rx));

            self.shared.insert(name.clone(), shared);
            self.tasks.insert(name.clone(), handle);
        }
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ModuleShared>> {
        self.shared.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleShared>> {
        self.shared.values()
    }

    /// Signal shutdown to every supervise-task, kill any live child by
    /// pid directly (not waiting on the supervise-task's own exit),
    /// and release every governor exactly once.
    ///
    /// `exit_tx` should already have had its stop message sent by the
    /// caller before this runs; `stop` doesn't send it itself so that
    /// the receiver-tasks and heartbeat-task (which share the same
    /// sender) unwind on the same signal.
    pub fn stop(&mut self) {
        for shared in self.shared.values() {
            if let Some(pid) = *shared.current_pid.lock() {
                kill_pid(pid);
            }
            shared.governor.lock().release();
        }
        self.tasks.clear();
        self.shared.clear();
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_for(1), BACKOFF_MIN);
        assert_eq!(backoff_for(2), Duration::from_secs(2));
        assert_eq!(backoff_for(3), Duration::from_secs(4));
        assert_eq!(backoff_for(20), BACKOFF_MAX);
    }

    #[test]
    fn resolve_falls_back_to_bare_name_for_unknown_module() {
        let path = resolve_executable("definitely-not-a-real-module-xyz");
        assert_eq!(path, PathBuf::from("definitely-not-a-real-module-xyz"));
    }

    #[test]
    fn crash_loop_latches_once_five_crashes_land_within_the_window() {
        let base = Instant::now() - Duration::from_secs(20);
        let mut timestamps = Vec::new();
        // Four crashes seconds apart, well inside CRASH_WINDOW (10s).
        for i in 0..4u64 {
            let latched = record_crash_and_check_loop(&mut timestamps, base + Duration::from_secs(i));
            assert!(!latched, "should not latch before the 5th crash");
        }
        let latched =
            record_crash_and_check_loop(&mut timestamps, base + Duration::from_secs(4));
        assert!(latched, "5 crashes within the window must latch disabled");
    }

    #[test]
    fn crash_loop_prunes_stale_entries_outside_the_window() {
        let base = Instant::now() - Duration::from_secs(60);
        let mut timestamps = vec![base, base + Duration::from_secs(1), base + Duration::from_secs(2)];
        // A 4th crash arriving 30s later should have pruned all three
        // earlier entries away (outside CRASH_WINDOW), so count resets to 1.
        let latched = record_crash_and_check_loop(&mut timestamps, base + Duration::from_secs(32));
        assert!(!latched);
        assert_eq!(timestamps.len(), 1);
    }

    #[test]
    fn crash_loop_does_not_latch_on_four_crashes() {
        let base = Instant::now() - Duration::from_secs(20);
        let mut timestamps = Vec::new();
        for i in 0..4u64 {
            let latched = record_crash_and_check_loop(&mut timestamps, base + Duration::from_secs(i));
            assert!(!latched);
        }
        assert_eq!(timestamps.len(), 4);
    }
}
