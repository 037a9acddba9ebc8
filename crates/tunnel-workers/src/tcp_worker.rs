//! Server-side per-stream state machine for `CONNECT` tunneling: dial the
//! requested host and pipe bytes bidirectionally.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::warn;
use tunnel_cache::Cache;
use tunnel_io::{TunnelReader, TunnelWriter};
use tunnel_protocol::{flags, Body, ContentType, Header, Msg, MsgType, StreamId};

use crate::dispatcher::WorkerHandles;
use crate::error::WorkerError;

const PIPE_CHUNK_SIZE: usize = 32 * 1024;

pub fn spawn(
    stream_id: StreamId,
    first_frame: Msg,
    handles: WorkerHandles,
    cache: Cache,
) -> mpsc::Sender<Msg> {
    let (tx, rx) = mpsc::channel(10);
    tokio::spawn(async move {
        if let Err(err) = run(stream_id, first_frame, rx, &handles, cache).await {
            warn!(%stream_id, error = %err, "tcp worker failed");
        }
        handles.report_done(stream_id).await;
    });
    tx
}

async fn run(
    stream_id: StreamId,
    first_frame: Msg,
    rx: mpsc::Receiver<Msg>,
    handles: &WorkerHandles,
    cache: Cache,
) -> Result<(), WorkerError> {
    let writer = TunnelWriter::new(handles.outbound.clone(), stream_id, flags::TCP);

    let host = match &first_frame.body {
        Body::TcpData { payload, .. } if first_frame.header.msg_type == MsgType::TcpConnect => {
            String::from_utf8_lossy(payload).into_owned()
        }
        _ => {
            writer.fail("expected TCP_CONNECT as the first frame").await?;
            return Err(WorkerError::NotATcpConnect);
        }
    };

    let socket = match TcpStream::connect(&host).await {
        Ok(socket) => socket,
        Err(err) => {
            writer.fail(format!("connect to {host} failed: {err}")).await?;
            return Err(WorkerError::ConnectFailed(host, err));
        }
    };

    let remote_addr = socket
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    handles
        .outbound
        .send(Msg::new(
            Header::new(stream_id, MsgType::TcpConnectRep, flags::TCP | flags::STREAM_BEGIN),
            Body::TcpData {
                content_type: ContentType::Raw,
                payload: Bytes::from(remote_addr.into_bytes()),
            },
        ))
        .await
        .ok();

    let mut reader = TunnelReader::new(rx, cache);
    let (mut socket_rx, mut socket_tx) = socket.into_split();

    let downstream = tokio::spawn(async move {
        let mut buf = vec![0u8; PIPE_CHUNK_SIZE];
        loop {
            match socket_rx.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if writer.write(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = writer.close().await;
    });

    let upstream = tokio::spawn(async move {
        loop {
            match reader.read_chunk(PIPE_CHUNK_SIZE).await {
                Ok(Some(chunk)) => {
                    if socket_tx.write_all(&chunk).await.is_err() {
                        break;
                    }
                }
                _ => break,
            }
        }
        let _ = socket_tx.shutdown().await;
    });

    let _ = tokio::join!(downstream, upstream);
    Ok(())
}
