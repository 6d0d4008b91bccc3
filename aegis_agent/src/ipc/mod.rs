//! Per-module IPC transport.
//!
//! One endpoint per supervised module, named `AegisPipe_<module>`. The
//! supervisor is always the server side; the module's own child
//! process dials in after it starts, and may reconnect after a
//! restart. Framing and connection semantics differ by platform (Unix
//! domain sockets need an explicit length-prefix; Windows named pipes
//! in message mode frame natively), so platform selection happens
//! once at compile time, same as the resource governor.
//!
//! Every implementation is split into a writer half and a reader half
//! at bind time, each independently lockable, so the heartbeat-task's
//! periodic PING send is never blocked behind a receiver-task's
//! in-progress (and possibly long-pending) receive.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;
#[cfg(not(any(unix, windows)))]
mod fallback;

#[cfg(unix)]
pub use unix::{bind, Reader, Writer};
#[cfg(windows)]
pub use windows::{bind, Reader, Writer};
#[cfg(not(any(unix, windows)))]
pub use fallback::{bind, Reader, Writer};

/// Channel name for a module, used to build the platform-specific
/// socket path / pipe path.
pub fn channel_name(module_name: &str) -> String {
    format!("AegisPipe_{module_name}")
}
