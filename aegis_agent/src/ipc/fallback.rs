//! Stub endpoint for platforms with neither Unix sockets nor named
//! pipes available. `bind` always fails; a module on such a platform
//! simply runs without a heartbeat channel (the supervisor logs and
//! continues when bind() errors).

use aegis_common::error::IpcError;

pub struct Writer;
pub struct Reader;

pub fn bind(module_name: &str) -> Result<(Writer, Reader), IpcError> {
    Err(IpcError::Io(
        module_name.to_string(),
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "IPC is not implemented on this platform",
        ),
    ))
}

impl Writer {
    pub async fn send(&mut self, _frame: &[u8]) -> Result<(), IpcError> {
        unreachable!("bind() always errs before a Writer is constructed")
    }
}

impl Reader {
    pub async fn receive(&mut self) -> Result<Vec<u8>, IpcError> {
        unreachable!("bind() always errs before a Reader is constructed")
    }
}
