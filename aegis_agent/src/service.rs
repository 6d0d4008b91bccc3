//! The out-of-scope OS service wrapper, reduced to the four lifecycle
//! callbacks it invokes on the core (spec.md §1, §6): `Start`, `Stop`,
//! and no-op `Install`/`Uninstall`. Modeled as a thin trait the same
//! way `evo_common::watchdog::Watchdog` is a trait the binary
//! implements rather than a concrete struct, keeping the dependency on
//! the (unimplemented) host service subsystem explicit and narrow.

use aegis_common::prelude::AgentConfig;

use crate::supervisor::Supervisor;

/// Lifecycle callbacks a hosting OS service subsystem would invoke.
///
/// `Install`/`Uninstall` default to no-ops: the real service-control
/// plumbing (Windows SCM registration, systemd unit installation, ...)
/// is an external collaborator per spec.md §1 and is not implemented
/// here.
pub trait ServiceHooks {
    /// Start the supervised core. Must return promptly; background
    /// work is spawned rather than awaited inline.
    fn start(&mut self, config: &AgentConfig);

    /// Initiate shutdown. Returns after issuing cancellation; does not
    /// await full teardown (spec.md §5).
    fn stop(&mut self);

    /// No-op: service installation is external to the core.
    fn install(&mut self) {
        tracing::info!("install is handled by the host service-control subsystem; no-op here");
    }

    /// No-op: service uninstallation is external to the core.
    fn uninstall(&mut self) {
        tracing::info!("uninstall is handled by the host service-control subsystem; no-op here");
    }
}

/// The concrete [`ServiceHooks`] implementation wrapping a [`Supervisor`].
#[derive(Default)]
pub struct AegisService {
    supervisor: Option<Supervisor>,
}

impl AegisService {
    pub fn new() -> Self {
        Self { supervisor: None }
    }
}

impl ServiceHooks for AegisService {
    fn start(&mut self, config: &AgentConfig) {
        self.supervisor = Some(Supervisor::start(config));
    }

    fn stop(&mut self) {
        if let Some(mut supervisor) = self.supervisor.take() {
            supervisor.stop();
        }
    }
}
