//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use aegis_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use aegis_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::AgentConfig;

// ─── Timing / sizing constants ──────────────────────────────────────
pub use crate::consts::*;

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{ConfigError, GovernorError, IpcError, SpawnError};
