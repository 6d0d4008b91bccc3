//! Root supervisor: owns the [`ModuleManager`](crate::manager::ModuleManager),
//! the per-module IPC endpoints, and the heartbeat/liveness loop.
//!
//! Bound to the hosting [`ServiceHooks`] lifetime (`aegis_agent::service`):
//! `Start` builds every module's supervise-task and IPC endpoint and
//! dispatches the heartbeat-task and per-module receiver-tasks, `Stop`
//! closes the shared `exit` broadcast and tears everything down.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use aegis_common::consts::{DEFAULT_HEARTBEAT_INTERVAL_S, LIVENESS_TIMEOUT, PING_FRAME, PONG_FRAME};
use aegis_common::prelude::AgentConfig;

use crate::ipc;
use crate::manager::ModuleManager;
use crate::module::ModuleShared;

/// Process-wide singleton bound to service lifetime (spec.md §3:
/// "Supervisor — process-wide singleton bound to service lifetime").
///
/// Owns the [`ModuleManager`] and the `name -> IpcEndpoint` map; the
/// single `exit` broadcast cancellation is shared by every supervise-
/// task, receiver-task, and the heartbeat-task.
pub struct Supervisor {
    manager: ModuleManager,
    exit_tx: broadcast::Sender<()>,
}

impl Supervisor {
    /// Build every configured module's supervise-task, bind its IPC
    /// endpoint, and dispatch the receiver-task and heartbeat-task.
    ///
    /// Per §5's shared-state discipline, both the module map and the
    /// `ipc_clients` map are built fully before any background task is
    /// dispatched against them.
    pub fn start(config: &AgentConfig) -> Self {
        let (exit_tx, _) = broadcast::channel(1);

        let mut manager = ModuleManager::new();
        manager.start(&config.modules, &exit_tx);

        let mut writers = HashMap::new();
        for name in &config.modules {
            let shared = match manager.module(name) {
                Some(s) => Arc::clone(s),
                None => continue,
            };

            match ipc::bind(name) {
                Ok((writer, reader)) => {
                    writers.insert(name.clone(), writer);
                    tokio::spawn(receiver_task(shared, reader, exit_tx.subscribe()));
                }
                Err(e) => {
                    tracing::warn!(module = %name, error = %e, "failed to bind IPC endpoint; liveness heartbeat disabled for this module");
                }
            }
        }

        let modules: Vec<Arc<ModuleShared>> = manager.modules().map(Arc::clone).collect();
        let heartbeat_interval = if config.heartbeat_interval == 0 {
            DEFAULT_HEARTBEAT_INTERVAL_S
        } else {
            config.heartbeat_interval
        };
        tracing::info!("📡 Monitoring: {} modules", config.modules.len());

        tokio::spawn(heartbeat_task(
            modules,
            writers,
            heartbeat_interval,
            exit_tx.subscribe(),
        ));

        Self { manager, exit_tx }
    }

    /// Close the shared `exit` broadcast (unblocking every supervise-,
    /// receiver-, and heartbeat-task's cancellation point), then kill
    /// any live child and release every governor.
    ///
    /// Does not await supervise-task exit — the hosting service's own
    /// lifetime is the outer await (spec.md §5).
    pub fn stop(&mut self) {
        let _ = self.exit_tx.send(());
        self.manager.stop();
    }
}

/// Drains frames from one module's IPC endpoint for the module's
/// entire lifetime. A `"Pong"` frame bumps [`ModuleShared::liveness`];
/// any other frame is forwarded to the log sink as an event. Exits on
/// `exit` or on a terminal [`IpcError::Closed`](aegis_common::error::IpcError::Closed)
/// (liveness timeout then takes over respawn duty, per spec.md §7).
async fn receiver_task(
    shared: Arc<ModuleShared>,
    mut reader: ipc::Reader,
    mut exit_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = exit_rx.recv() => {
                tracing::debug!(module = %shared.name, "receiver task stopping on exit signal");
                return;
            }
            frame = reader.receive() => {
                match frame {
                    Ok(bytes) if bytes == PONG_FRAME => {
                        shared.liveness.touch();
                    }
                    Ok(bytes) => {
                        let text = String::from_utf8_lossy(&bytes);
                        tracing::info!(module = %shared.name, "[{}] {}", shared.name, text);
                    }
                    Err(aegis_common::error::IpcError::Closed(_)) => {
                        tracing::warn!(module = %shared.name, "IPC endpoint closed by peer; liveness timeout will trigger a respawn");
                        return;
                    }
                    Err(aegis_common::error::IpcError::Transient(_, reason)) => {
                        tracing::debug!(module = %shared.name, reason, "transient IPC condition, retrying");
                        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    }
                    Err(e) => {
                        tracing::warn!(module = %shared.name, error = %e, "IPC receive error");
                        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    }
                }
            }
        }
    }
}

/// Ticks every `heartbeat_interval` seconds: sends a PING on every
/// module's endpoint, then checks every module's `last_pong_at`
/// against [`LIVENESS_TIMEOUT`] and requests a kill of any module that
/// has gone quiet (spec.md §4.2, P5).
async fn heartbeat_task(
    modules: Vec<Arc<ModuleShared>>,
    mut writers: HashMap<String, ipc::Writer>,
    heartbeat_interval_s: u64,
    mut exit_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(std::time::Duration::from_secs(heartbeat_interval_s));

    loop {
        tokio::select! {
            _ = exit_rx.recv() => {
                tracing::debug!("heartbeat task stopping on exit signal");
                return;
            }
            _ = ticker.tick() => {
                for shared in &modules {
                    if shared.is_disabled() {
                        continue;
                    }

                    // Both the PING send and the liveness check are scoped to
                    // "every module with a valid IpcEndpoint" (spec.md §4.2):
                    // a module with no writer never gets a fresh PONG, so
                    // checking liveness for it would just fire the kill every
                    // tick forever instead of leaving it in degraded mode.
                    let Some(writer) = writers.get_mut(&shared.name) else {
                        continue;
                    };

                    if let Err(e) = writer.send(PING_FRAME).await {
                        tracing::debug!(module = %shared.name, error = %e, "PING send failed");
                    }

                    if shared.liveness.elapsed() > LIVENESS_TIMEOUT {
                        tracing::error!(module = %shared.name, "🛑 CRITICAL: no PONG for over {}s, requesting kill", LIVENESS_TIMEOUT.as_secs());
                        shared.kill_notify.notify_one();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_with_no_modules_dispatches_heartbeat_only() {
        let config = AgentConfig {
            modules: Vec::new(),
            log_path: None,
            heartbeat_interval: 1,
        };
        let mut supervisor = Supervisor::start(&config);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        supervisor.stop();
    }
}
