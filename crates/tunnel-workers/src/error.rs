#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("the dispatcher's event channel is closed")]
    DispatcherClosed,
    #[error(transparent)]
    Io(#[from] tunnel_io::TunnelIoError),
    #[error(transparent)]
    HttpWire(#[from] tunnel_http_wire::HttpWireError),
    #[error(transparent)]
    Cache(#[from] tunnel_cache::CacheError),
    #[error(transparent)]
    Protocol(#[from] tunnel_protocol::ProtocolError),
    #[error("origin fetch failed: {0}")]
    OriginFetch(String),
    #[error("connect to {0} failed: {1}")]
    ConnectFailed(String, std::io::Error),
    #[error("expected TCP_CONNECT as the first frame on a new TCP stream")]
    NotATcpConnect,
}
