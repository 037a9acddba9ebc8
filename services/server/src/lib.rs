//! `TunnelServer`: accepts transport connections, demultiplexes inbound
//! frames to per-stream workers, and serializes replies back out.

pub mod config;
pub mod connection;
pub mod error;
pub mod state;

use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

pub use error::ServerError;
pub use state::ServerState;

/// Normalizes a Go-style bind address (`:8080`, `*:8081`) to one
/// `tokio::net::TcpListener` accepts.
pub fn normalize_bind(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if let Some(port) = addr.strip_prefix("*:") {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_owned()
    }
}

/// Binds `bind_addr` and accepts connections forever, handing each off to
/// its own [`connection::handle`] task. Returns only on bind failure.
pub async fn serve(bind_addr: &str, state: ServerState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind_addr.to_owned(),
            source,
        })?;
    info!(addr = %bind_addr, "tunnel server listening");
    serve_on(listener, state).await
}

/// Accepts connections forever on an already-bound listener. Used by the
/// `proxy` subcommand, which binds an ephemeral loopback port itself so it
/// can hand the resolved address to the in-process client.
pub async fn serve_on(listener: TcpListener, state: ServerState) -> Result<(), ServerError> {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                let peer_id = Uuid::new_v4().to_string();
                let state = state.clone();
                info!(%peer_addr, peer_id = %peer_id, "accepted connection");
                tokio::spawn(connection::handle(socket, peer_id, state));
            }
            Err(err) => {
                warn!(error = %err, "accept error");
            }
        }
    }
}
