//! Library surface for the `aegis-agent` binary: the supervision core
//! (spec.md's triad) plus the thin service-lifecycle wrapper around
//! it. Split out from `main.rs` so integration tests under `tests/`
//! can drive `ModuleManager`/`Supervisor` directly against real child
//! processes instead of only the compiled binary.

pub mod governor;
pub mod ipc;
pub mod manager;
pub mod module;
pub mod service;
pub mod supervisor;
