//! Windows named pipe endpoint, `\\.\pipe\AegisPipe_<module>`.
//!
//! Opened in message mode so a single `write_all` on the client side
//! arrives as a single `read` on ours — no manual length prefix
//! needed, unlike the Unix socket side. A background task keeps
//! creating fresh pipe instances and waiting for a client to connect,
//! mirroring the Unix acceptor loop: a respawned module reconnecting
//! just supersedes whatever instance the writer/reader halves were
//! last handed.

use std::sync::Arc;

use tokio::io::{split, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::windows::named_pipe::{NamedPipeServer, PipeMode, ServerOptions};
use tokio::sync::{mpsc, Mutex as TokioMutex};

use aegis_common::error::IpcError;

use super::channel_name;

pub struct Writer {
    name: String,
    slot: Arc<TokioMutex<Option<WriteHalf<NamedPipeServer>>>>,
}

pub struct Reader {
    name: String,
    incoming: mpsc::Receiver<ReadHalf<NamedPipeServer>>,
    current: Option<ReadHalf<NamedPipeServer>>,
}

/// Create the pipe and spawn the acceptor task; returns the split
/// writer/reader halves.
pub fn bind(module_name: &str) -> Result<(Writer, Reader), IpcError> {
    let name = channel_name(module_name);
    let path = format!(r"\\.\pipe\{name}");

    let slot = Arc::new(TokioMutex::new(None));
    let (tx, rx) = mpsc::channel(1);

    let acceptor_name = name.clone();
    let acceptor_path = path.clone();
    let acceptor_slot = slot.clone();
    tokio::spawn(async move {
        let mut first = true;
        loop {
            let server = ServerOptions::new()
                .pipe_mode(PipeMode::Message)
                .first_pipe_instance(first)
                .in_buffer_size(4096)
                .out_buffer_size(4096)
                .create(&acceptor_path);
            first = false;

            let server = match server {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(module = %acceptor_name, error = %e, "failed to create named pipe instance, endpoint dead");
                    break;
                }
            };

            // ERROR_PIPE_CONNECTED (a client already waiting when the
            // instance was created) is surfaced by tokio as Ok(()), so
            // no special-casing is needed here.
            if let Err(e) = server.connect().await {
                tracing::error!(module = %acceptor_name, error = %e, "named pipe connect failed, endpoint dead");
                break;
            }

            let (r, w) = split(server);
            *acceptor_slot.lock().await = Some(w);
            if tx.send(r).await.is_err() {
                break;
            }
        }
    });

    Ok((
        Writer {
            name: name.clone(),
            slot,
        },
        Reader {
            name,
            incoming: rx,
            current: None,
        },
    ))
}

impl Writer {
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), IpcError> {
        let mut guard = self.slot.lock().await;
        let w = guard
            .as_mut()
            .ok_or_else(|| IpcError::Transient(self.name.clone(), "no client connected yet".to_string()))?;

        if let Err(e) = w.write_all(frame).await {
            *guard = None;
            return Err(IpcError::Io(self.name.clone(), e));
        }
        Ok(())
    }
}

impl Reader {
    pub async fn receive(&mut self) -> Result<Vec<u8>, IpcError> {
        loop {
            if self.current.is_none() {
                self.current = Some(
                    self.incoming
                        .recv()
                        .await
                        .ok_or_else(|| IpcError::Closed(self.name.clone()))?,
                );
            }

            let incoming = &mut self.incoming;
            let current = self.current.as_mut().expect("just ensured");

            let mut buf = vec![0u8; 4096];
            tokio::select! {
                next = incoming.recv() => {
                    match next {
                        Some(fresh) => {
                            // A new client (e.g. a respawned module reconnecting)
                            // supersedes the connection we were reading from.
                            self.current = Some(fresh);
                            continue;
                        }
                        None => return Err(IpcError::Closed(self.name.clone())),
                    }
                }
                read = current.read(&mut buf) => {
                    return match read {
                        Ok(0) => {
                            self.current = None;
                            Err(IpcError::Closed(self.name.clone()))
                        }
                        Ok(n) => {
                            buf.truncate(n);
                            Ok(buf)
                        }
                        Err(e) if e.raw_os_error() == Some(winapi::shared::winerror::ERROR_BROKEN_PIPE as i32) => {
                            self.current = None;
                            Err(IpcError::Closed(self.name.clone()))
                        }
                        Err(e) => {
                            self.current = None;
                            Err(IpcError::Io(self.name.clone(), e))
                        }
                    };
                }
            }
        }
    }
}
