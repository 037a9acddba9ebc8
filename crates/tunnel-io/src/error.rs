#[derive(Debug, thiserror::Error)]
pub enum TunnelIoError {
    #[error("remote error: {0}")]
    Remote(String),
    #[error(transparent)]
    Protocol(#[from] tunnel_protocol::ProtocolError),
    #[error(transparent)]
    Cache(#[from] tunnel_cache::CacheError),
    #[error("the stream's channel is closed")]
    ChannelClosed,
}
