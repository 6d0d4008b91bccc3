//! Unix domain socket endpoint.
//!
//! Frames are length-prefixed: a 4-byte big-endian length followed by
//! that many payload bytes. A background task owns the `UnixListener`
//! and keeps accepting for the whole life of the module, so a
//! respawned child reconnecting just supersedes whatever connection
//! the writer/reader halves were last handed.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Mutex as TokioMutex};

use aegis_common::error::IpcError;

use super::channel_name;

const SOCKET_DIR: &str = "/tmp/aegis-agent";

pub struct Writer {
    name: String,
    slot: std::sync::Arc<TokioMutex<Option<OwnedWriteHalf>>>,
}

pub struct Reader {
    name: String,
    incoming: mpsc::Receiver<OwnedReadHalf>,
    current: Option<OwnedReadHalf>,
}

/// Bind the listener and spawn the acceptor task; returns the split
/// writer/reader halves.
pub fn bind(module_name: &str) -> Result<(Writer, Reader), IpcError> {
    let name = channel_name(module_name);
    let dir = PathBuf::from(SOCKET_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| IpcError::Io(name.clone(), e))?;

    let path = dir.join(format!("{name}.sock"));
    // A stale socket file from a previous run would otherwise make
    // bind() fail with AddrInUse.
    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path).map_err(|e| IpcError::Io(name.clone(), e))?;

    let slot = std::sync::Arc::new(TokioMutex::new(None));
    let (tx, rx) = mpsc::channel(1);

    let acceptor_name = name.clone();
    let acceptor_slot = slot.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let (r, w) = stream.into_split();
                    *acceptor_slot.lock().await = Some(w);
                    if tx.send(r).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(module = %acceptor_name, error = %e, "unix socket accept failed, endpoint dead");
                    break;
                }
            }
        }
        // Socket file removal happens via Writer/Reader Drop, not here:
        // the listener owns the bind but not the cleanup responsibility.
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

        let len = (frame.len() as u32).to_be_bytes();
        let result: std::io::Result<()> = async {
            w.write_all(&len).await?;
            w.write_all(frame).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
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
                frame = read_length_prefixed(current) => {
                    return match frame {
                        Ok(Some(bytes)) => Ok(bytes),
                        Ok(None) => {
                            self.current = None;
                            Err(IpcError::Closed(self.name.clone()))
                        }
                        Err(e) => Err(e),
                    };
                }
            }
        }
    }
}

async fn read_length_prefixed<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<Option<Vec<u8>>, IpcError> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(IpcError::Io("frame length".to_string(), e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .map_err(|e| IpcError::Io("frame payload".to_string(), e))?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn round_trips_a_framed_message() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("AegisPipe_test.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let slot = std::sync::Arc::new(TokioMutex::new(None));
        let (tx, rx) = mpsc::channel(1);
        let acceptor_slot = slot.clone();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let (r, w) = stream.into_split();
                *acceptor_slot.lock().await = Some(w);
                let _ = tx.send(r).await;
            }
        });
        let mut reader = Reader {
            name: "test".to_string(),
            incoming: rx,
            current: None,
        };

        let client_path = sock_path.clone();
        let client = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&client_path).await.unwrap();
            stream.write_all(&4u32.to_be_bytes()).await.unwrap();
            stream.write_all(b"Ping").await.unwrap();
        });

        let received = reader.receive().await.unwrap();
        assert_eq!(received, b"Ping");
        client.await.unwrap();
    }
}
