#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("remote reported an error for the connect: {0}")]
    RemoteRejected(String),
    #[error("connection to tunnel server closed before a reply arrived")]
    ConnectionClosed,
    #[error(transparent)]
    Protocol(#[from] tunnel_protocol::ProtocolError),
    #[error(transparent)]
    Io(#[from] tunnel_io::TunnelIoError),
    #[error(transparent)]
    HttpWire(#[from] tunnel_http_wire::HttpWireError),
}
