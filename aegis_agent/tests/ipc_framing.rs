//! S6 (framing integrity, Unix): a large event frame sent by a client
//! must be reassembled as a single frame regardless of the reader's
//! internal buffer size, since `Reader::receive` reads the 4-byte
//! length prefix and then accumulates exactly that many payload bytes.

#![cfg(unix)]

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use aegis_agent::ipc;

#[tokio::test]
async fn large_event_frame_round_trips_as_a_single_frame() {
    let module_name = format!("ipc-framing-test-{}", std::process::id());
    let (mut writer, mut reader) = ipc::bind(&module_name).expect("bind should succeed");

    let sock_path = format!("/tmp/aegis-agent/AegisPipe_{module_name}.sock");
    // Give the acceptor task a moment to start listening.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let payload = vec![b'x'; 5000];
    let client_payload = payload.clone();
    let client = tokio::spawn(async move {
        let mut stream = UnixStream::connect(&sock_path)
            .await
            .expect("client should connect");
        stream
            .write_all(&(client_payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&client_payload).await.unwrap();
    });

    let received = reader.receive().await.expect("frame should be received whole");
    assert_eq!(received.len(), 5000);
    assert_eq!(received, payload);

    client.await.unwrap();

    // The writer side (server -> module direction) shares the same
    // connection slot; sending after the client has gone away is a
    // best-effort no-op rather than a panic, exercising the same path
    // the heartbeat task uses for PING.
    let _ = writer.send(aegis_common::consts::PING_FRAME).await;
}
