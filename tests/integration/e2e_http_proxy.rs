//! Drives the whole stack through the public front door: a plain HTTP
//! client talks to `local_proxy`, which tunnels the request over a real
//! `TunnelClient` -> `TunnelServer` connection to a loopback origin.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tunnel_cache::Cache;

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    tokio::time::sleep(Duration::from_millis(10)).await;
    port
}

/// Answers one request with a canned response, then exits.
async fn start_origin(body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let mut total = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            total.extend_from_slice(&buf[..n]);
            if total.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
    });
    format!("{}:{}", addr.ip(), addr.port())
}

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state = server::ServerState::new();
    tokio::spawn(server::serve_on(listener, state));
    addr
}

async fn start_proxy(server_addr: &str) -> String {
    let tunnel_client = client::TunnelClient::connect(server_addr, Cache::new())
        .await
        .expect("client should connect to the in-process server");
    let port = free_port().await;
    let bind_addr = format!("127.0.0.1:{port}");
    let serve_addr = bind_addr.clone();
    tokio::spawn(async move {
        client::local_proxy::serve(&serve_addr, tunnel_client).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    bind_addr
}

async fn request_through_proxy(proxy_addr: &str, origin_addr: &str) -> (String, Vec<u8>) {
    let mut socket = tokio::net::TcpStream::connect(proxy_addr).await.unwrap();
    let request = format!(
        "GET http://{origin_addr}/resource HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n"
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => raw.extend_from_slice(&buf[..n]),
            Ok(Err(err)) => panic!("read from proxy failed: {err}"),
        }
    }

    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("response must have a head/body split");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let body = raw[split + 4..].to_vec();
    (head, body)
}

#[tokio::test]
async fn cold_get_round_trips_origin_body_through_the_full_stack() {
    let origin_addr = start_origin(b"hello from the other side").await;
    let server_addr = start_server().await;
    let proxy_addr = start_proxy(&server_addr).await;

    let (head, body) = request_through_proxy(&proxy_addr, &origin_addr).await;

    assert!(head.starts_with("HTTP/1.1 200"), "unexpected status line: {head}");
    assert_eq!(body, b"hello from the other side");
}

#[tokio::test]
async fn connect_tunnels_a_raw_byte_stream_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let n = socket.read(&mut buf).await.unwrap();
        socket.write_all(&buf[..n]).await.unwrap();
    });

    let server_addr = start_server().await;
    let proxy_addr = start_proxy(&server_addr).await;

    let mut socket = tokio::net::TcpStream::connect(&proxy_addr).await.unwrap();
    let connect = format!("CONNECT {origin_addr} HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n");
    socket.write_all(connect.as_bytes()).await.unwrap();

    let mut buf = [0u8; 128];
    let n = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf))
        .await
        .expect("CONNECT response should not time out")
        .unwrap();
    let response = String::from_utf8_lossy(&buf[..n]);
    assert!(response.starts_with("HTTP/1.0 200"), "unexpected CONNECT response: {response}");

    socket.write_all(b"ping").await.unwrap();
    let n = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf))
        .await
        .expect("echoed bytes should not time out")
        .unwrap();
    assert_eq!(&buf[..n], b"ping");
}
