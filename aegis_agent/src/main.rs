//! Aegis Agent — cross-platform supervisor for the Aegis worker
//! modules.
//!
//! Hosts the core triad (`ModuleManager`/supervise-task state machine,
//! `ResourceGovernor`, `IpcEndpoint`) behind a thin `ServiceHooks`
//! lifecycle. The real OS service wrapper (Windows SCM registration,
//! a systemd unit, ...) is out of scope (spec.md §1) — this binary
//! only recognizes the four conventional service-control verbs and
//! otherwise runs the supervisor inline under Ctrl-C / SIGTERM.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use parking_lot::Mutex;

use aegis_agent::service::{AegisService, ServiceHooks};
use aegis_common::consts::DEFAULT_CONFIG_PATH;
use aegis_common::prelude::AgentConfig;

/// A writer that clones cheaply (an `Arc<Mutex<File>>` handle), so
/// `tracing_subscriber` can hand one to each log event without holding
/// the file open behind a single non-`Clone` handle.
#[derive(Clone)]
struct FileWriter(Arc<Mutex<std::fs::File>>);

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

#[derive(Parser)]
#[command(
    name = "aegis-agent",
    about = "Cross-platform supervisor for Aegis Agent worker modules"
)]
struct Cli {
    /// Service-control verb, delegated to the host OS service subsystem.
    /// Any other invocation (i.e. none) runs the supervisor inline.
    action: Option<ServiceAction>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum ServiceAction {
    Install,
    Uninstall,
    Start,
    Stop,
}

/// Install the global `tracing` subscriber (`with_target(false)`,
/// thread ids, line numbers). Falls back to stderr with a warning if
/// `log_path` is set but can't be opened, rather than failing startup.
fn init_logging(log_path: Option<&PathBuf>) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    let Some(path) = log_path else {
        builder.init();
        return;
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let file = Arc::new(Mutex::new(file));
            builder
                .with_writer(move || FileWriter(file.clone()))
                .init();
        }
        Err(e) => {
            builder.init();
            // Logging is live now (stderr), so this warning actually lands.
            tracing::warn!(path = %path.display(), error = %e, "failed to open log file, falling back to stderr");
        }
    }
}

/// Load `agent.yml` before logging is initialized (so the `log_path`
/// it names can drive the subscriber's writer), returning both the
/// config and whether loading failed so the caller can log the
/// failure once logging is live.
fn load_config(path: &PathBuf) -> (AgentConfig, Option<aegis_common::error::ConfigError>) {
    match AgentConfig::load(path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AgentConfig::default(), Some(e)),
    }
}

/// Waits for Ctrl-C, or on Unix, SIGTERM as well — either unblocks
/// the supervisor's inline run loop (spec.md §5: cancellation must
/// unblock within a bounded time).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Run the supervisor until a shutdown signal arrives, then stop it.
async fn run_until_signaled(service: &mut AegisService, config: &AgentConfig) {
    service.start(config);
    wait_for_shutdown_signal().await;
    tracing::info!("🛑 shutdown signal received, stopping supervisor");
    service.stop();
    tracing::info!("🏁 Aegis Agent shutdown complete");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let (config, load_err) = load_config(&config_path);
    init_logging(config.log_path.as_ref());

    tracing::info!("🚀 Starting Aegis Agent");

    if let Some(e) = load_err {
        tracing::warn!(error = %e, path = %config_path.display(), "failed to load agent config, proceeding with empty module set");
    }

    let mut service = AegisService::new();

    match cli.action {
        None => run_until_signaled(&mut service, &config).await,
        Some(action) => {
            tracing::info!(
                action = ?action,
                "📡 service-control verb received; OS service subsystem registration \
                 (install/start/stop plumbing) is external to this core"
            );
            match action {
                ServiceAction::Install => service.install(),
                ServiceAction::Uninstall => service.uninstall(),
                // A real service host would invoke `Start`/`Stop` on an
                // already-running process via the SCM/systemd; without
                // that host, running inline is the closest faithful
                // behavior this binary alone can offer.
                ServiceAction::Start => run_until_signaled(&mut service, &config).await,
                ServiceAction::Stop => service.stop(),
            }
        }
    }
}
