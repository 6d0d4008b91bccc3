//! Module record types shared between the supervise-task, the
//! heartbeat task, and `ModuleManager` itself.
//!
//! The supervise-task owns its restart bookkeeping (`restart_count`,
//! `crash_timestamps`, backoff) exclusively — nothing outside that
//! task ever touches them. The fields in [`ModuleShared`] are the only
//! ones that genuinely cross task boundaries, so they're the only
//! ones wrapped for shared mutation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::governor::PlatformGovernor;

/// States of the per-module supervise-task state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Spawning,
    Running,
    Exited,
    Backoff,
    /// Terminal: crash-loop latch tripped. No further spawns.
    Disabled,
    /// Terminal: graceful shutdown observed.
    Stopped,
}

/// Last-PONG timestamp, shared between the receiver-task (which bumps
/// it on every PONG) and the heartbeat-task (which reads it to decide
/// whether a module has gone deaf).
#[derive(Clone)]
pub struct Liveness(Arc<Mutex<Instant>>);

impl Liveness {
    pub fn new(now: Instant) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn touch(&self) {
        *self.0.lock() = Instant::now();
    }

    pub fn reset(&self, at: Instant) {
        *self.0.lock() = at;
    }

    pub fn elapsed(&self) -> Duration {
        self.0.lock().elapsed()
    }
}

/// The subset of a module's state visible outside its supervise-task:
/// liveness tracking, a way for the heartbeat-task to demand the
/// current child be killed, and the governor handle that
/// `ModuleManager::stop` releases exactly once at shutdown.
pub struct ModuleShared {
    pub name: String,
    pub executable_path: PathBuf,
    pub liveness: Liveness,
    pub kill_notify: Arc<Notify>,
    pub disabled: Arc<AtomicBool>,
    pub governor: Arc<Mutex<PlatformGovernor>>,
    /// Pid of the currently-running child, if any. Read by
    /// `ModuleManager::stop` to kill a live child directly, without
    /// waiting on the owning supervise-task to react to the stop
    /// broadcast on its own schedule.
    pub current_pid: Arc<Mutex<Option<u32>>>,
}

impl ModuleShared {
    pub fn new(name: String, executable_path: PathBuf, governor: PlatformGovernor) -> Self {
        Self {
            name,
            executable_path,
            liveness: Liveness::new(Instant::now()),
            kill_notify: Arc::new(Notify::new()),
            disabled: Arc::new(AtomicBool::new(false)),
            governor: Arc::new(Mutex::new(governor)),
            current_pid: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_touch_resets_elapsed() {
        let l = Liveness::new(Instant::now() - Duration::from_secs(60));
        assert!(l.elapsed() >= Duration::from_secs(60));
        l.touch();
        assert!(l.elapsed() < Duration::from_secs(1));
    }
}
