//! Supervision timing and resource-cap constants.
//!
//! Single source of truth for the timeouts and caps that drive the
//! supervisor state machine, the heartbeat loop, and the resource
//! governor. Imported by every part of `aegis_agent` — no duplication
//! permitted.

use std::time::Duration;

/// Sliding window used for crash-loop detection.
pub const CRASH_WINDOW: Duration = Duration::from_secs(10);

/// Crash count within [`CRASH_WINDOW`] that latches a module `disabled`.
pub const CRASH_MAX: u32 = 5;

/// Uptime after which backoff and restart_count reset to their initial values.
pub const UPTIME_RESET: Duration = Duration::from_secs(5 * 60);

/// Initial (and post-reset) backoff delay.
pub const BACKOFF_MIN: Duration = Duration::from_secs(1);

/// Backoff delay ceiling; the doubling sequence saturates here.
pub const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Maximum time without a PONG before a child is considered deadlocked.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Default heartbeat tick interval, used when the config omits one.
pub const DEFAULT_HEARTBEAT_INTERVAL_S: u64 = 5;

/// CPU rate cap, expressed in units of 1/100 of a percent (500 = 5.00%).
pub const CPU_CAP_HUNDREDTHS_PERCENT: u32 = 500;

/// cgroup v2 `cpu.max` value equivalent to the 5% cap (5ms / 100ms period).
pub const CGROUP_CPU_MAX: &str = "5000 100000";

/// Memory cap in bytes (200 MiB).
pub const MEM_CAP_BYTES: u64 = 200 * 1024 * 1024;

/// Root directory under which per-module Linux cgroups are created.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup/aegis-agent";

/// Liveness probe frame sent supervisor -> module.
pub const PING_FRAME: &[u8] = b"Ping";

/// Liveness reply frame sent module -> supervisor.
pub const PONG_FRAME: &[u8] = b"Pong";

/// Default path to the agent's YAML configuration file, relative to cwd.
pub const DEFAULT_CONFIG_PATH: &str = "../config/agent.yml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_bounds_are_consistent() {
        assert!(BACKOFF_MIN < BACKOFF_MAX);
        assert!(BACKOFF_MIN.as_secs() >= 1);
    }

    #[test]
    fn crash_loop_bounds_are_consistent() {
        assert!(CRASH_MAX >= 1);
        assert!(CRASH_WINDOW < UPTIME_RESET);
    }

    #[test]
    fn liveness_timeout_exceeds_default_heartbeat() {
        assert!(LIVENESS_TIMEOUT.as_secs() > DEFAULT_HEARTBEAT_INTERVAL_S);
    }

    #[test]
    fn frames_are_four_bytes() {
        assert_eq!(PING_FRAME.len(), 4);
        assert_eq!(PONG_FRAME.len(), 4);
    }
}
