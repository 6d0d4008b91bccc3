//! Platform resource governor.
//!
//! Caps a module's child process at the CPU/memory ceilings in
//! `aegis_common::consts` using whatever kernel primitive the target
//! platform offers. Platform selection is compile-time (`cfg`), not a
//! runtime trait object — each build only ever contains one
//! implementation.

use aegis_common::error::GovernorError;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(windows)]
mod windows;
#[cfg(not(any(target_os = "linux", windows)))]
mod fallback;

#[cfg(target_os = "linux")]
pub use linux::LinuxCgroupGovernor as PlatformGovernor;
#[cfg(windows)]
pub use windows::WindowsJobGovernor as PlatformGovernor;
#[cfg(not(any(target_os = "linux", windows)))]
pub use fallback::FallbackGovernor as PlatformGovernor;

/// Caps a single module's children at the CPU/memory ceiling.
///
/// `apply` is called once per observed spawn (a fresh pid after a
/// restart); the underlying kernel primitive (cgroup, Job Object) is
/// created at most once and reused for subsequent pids. `release` is
/// called exactly once, by `ModuleManager::stop`, when the module is
/// permanently torn down.
pub trait ResourceGovernor: Send {
    /// Create the primitive if needed, and attach `pid` to it.
    ///
    /// Failure is never fatal to the caller: the child keeps running
    /// unconstrained and the caller logs the error at WARN.
    fn apply(&mut self, pid: u32) -> Result<(), GovernorError>;

    /// Tear down the primitive. Idempotent.
    fn release(&mut self);
}

/// Construct the governor for the running platform.
pub fn new_governor(module_name: &str) -> PlatformGovernor {
    PlatformGovernor::new(module_name)
}
