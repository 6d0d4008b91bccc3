//! Aegis Agent Common Library
//!
//! Shared configuration loading, error taxonomy, and timing/sizing
//! constants used by the `aegis_agent` supervisor binary.
//!
//! # Module Structure
//!
//! - [`config`] - `agent.yml` loading
//! - [`error`] - shared error taxonomy
//! - [`consts`] - supervision timing and resource-cap constants
//! - [`prelude`] - common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use aegis_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod prelude;
