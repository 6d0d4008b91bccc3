//! Shared error taxonomy.
//!
//! One enum per concern, following the style of `evo_shared_memory`'s
//! `ShmError`: `#[error("...")]` on every variant, `#[from]` for the
//! wrapped I/O/parse errors that cross a module boundary unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or parsing `agent.yml`.
///
/// Per spec, a `ConfigError` is never fatal to the supervisor: the
/// caller logs it and proceeds with an empty module set.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist at the expected path.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists and was read, but is not valid YAML for `AgentConfig`.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors attaching a spawned pid to a platform resource governor.
///
/// Always non-fatal: the supervise-task logs a `GovernorError` at WARN
/// and continues running the child without enforcement.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// Creating the underlying kernel primitive (Job Object / cgroup dir) failed.
    #[error("failed to create resource governor for module '{module}': {reason}")]
    Create { module: String, reason: String },

    /// The primitive exists, but assigning this pid to it failed.
    #[error("failed to attach pid {pid} to governor for module '{module}': {reason}")]
    Attach {
        module: String,
        pid: u32,
        reason: String,
    },
}

/// Errors from the per-module IPC endpoint.
#[derive(Debug, Error)]
pub enum IpcError {
    /// A transient condition: would-block, or the peer hasn't connected yet.
    /// The receiver task retries after a short sleep.
    #[error("transient IPC condition on '{0}': {1}")]
    Transient(String, String),

    /// The channel was closed by the peer. Terminal for the current
    /// connection; the receiver task exits and liveness timeout takes
    /// over restart duty.
    #[error("IPC channel for '{0}' closed by peer")]
    Closed(String),

    /// An unrecoverable I/O error not covered by the above.
    #[error("IPC I/O error on '{0}': {1}")]
    Io(String, #[source] std::io::Error),
}

/// Error spawning a module's child process.
///
/// Folded into the supervise-task's crash-loop bookkeeping: a spawn
/// failure is recorded as a synthetic crash timestamp (see
/// `aegis_agent::module`), an intentional conflation of "never
/// spawned" with "crashed".
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn module '{module}' ({path}): {source}")]
    Io {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
