//! The HTTP proxy front-end browsers connect to. `CONNECT` is tunneled as
//! a raw byte pipe; every other method is relayed via `round_trip`.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tunnel_http_wire::{content_length, parse_request_head, serialize_request_head, HeaderField};

use crate::client::TunnelClient;

const PIPE_CHUNK_SIZE: usize = 32 * 1024;

/// Binds `bind_addr` and serves proxy connections forever.
pub async fn serve(bind_addr: &str, client: TunnelClient) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "http proxy listening");
    loop {
        let (socket, peer_addr) = listener.accept().await?;
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, &client).await {
                warn!(%peer_addr, error = %err, "proxy connection failed");
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream, client: &TunnelClient) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    let (head, consumed) = loop {
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        match parse_request_head(&buf) {
            Ok(Some(parsed)) => break parsed,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "malformed proxy request head");
                return Ok(());
            }
        }
    };
    let mut body = buf.split_off(consumed).to_vec();

    if head.method.eq_ignore_ascii_case("CONNECT") {
        return handle_connect(socket, &head.path, client).await;
    }

    if let Some(expected) = content_length(&head.headers) {
        while body.len() < expected {
            let mut chunk = [0u8; 4096];
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    handle_relayed_request(socket, head.method, head.path, head.headers, body, client).await
}

async fn handle_connect(mut socket: TcpStream, target: &str, client: &TunnelClient) -> std::io::Result<()> {
    match client.connect_tcp(target).await {
        Ok((mut reader, writer)) => {
            socket.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await?;
            let (mut socket_rx, mut socket_tx) = socket.into_split();

            let upstream = tokio::spawn(async move {
                let mut buf = vec![0u8; PIPE_CHUNK_SIZE];
                loop {
                    match socket_rx.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if writer.write(bytes::Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = writer.close().await;
            });

            let downstream = tokio::spawn(async move {
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

            let _ = tokio::join!(upstream, downstream);
            Ok(())
        }
        Err(err) => {
            warn!(%target, error = %err, "CONNECT target unreachable");
            socket.write_all(b"HTTP/1.0 502 Bad Gateway\r\n\r\n").await
        }
    }
}

async fn handle_relayed_request(
    mut socket: TcpStream,
    method: String,
    path: String,
    headers: Vec<HeaderField>,
    body: Vec<u8>,
    client: &TunnelClient,
) -> std::io::Result<()> {
    let cache_key = path.clone().into_bytes();
    let request_head = serialize_request_head(&method, &path, &headers);

    let mut reader = match client.round_trip(cache_key, request_head, body).await {
        Ok(reader) => reader,
        Err(err) => {
            warn!(%path, error = %err, "round trip failed");
            return socket.write_all(b"HTTP/1.0 502 Bad Gateway\r\n\r\n").await;
        }
    };

    let mut head_buf = BytesMut::new();
    let (head, consumed) = loop {
        match tunnel_http_wire::parse_response_head(&head_buf) {
            Ok(Some(parsed)) => break parsed,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "malformed upstream response head");
                return socket.write_all(b"HTTP/1.0 502 Bad Gateway\r\n\r\n").await;
            }
        }
        match reader.read_chunk(8192).await {
            Ok(Some(chunk)) => head_buf.extend_from_slice(&chunk),
            _ => {
                return socket.write_all(b"HTTP/1.0 502 Bad Gateway\r\n\r\n").await;
            }
        }
    };

    let response_line = format!(
        "HTTP/1.1 {} {}\r\n",
        head.status,
        if head.reason.is_empty() { "OK" } else { &head.reason }
    );
    socket.write_all(response_line.as_bytes()).await?;
    for header in &head.headers {
        let line = format!("{}: {}\r\n", header.name, header.value);
        socket.write_all(line.as_bytes()).await?;
    }
    socket.write_all(b"\r\n").await?;

    let trailing = head_buf.split_off(consumed);
    if !trailing.is_empty() {
        socket.write_all(&trailing).await?;
    }
    while let Ok(Some(chunk)) = reader.read_chunk(PIPE_CHUNK_SIZE).await {
        socket.write_all(&chunk).await?;
    }
    Ok(())
}
