use crate::header::MsgType;

/// Errors surfaced while decoding frames off the wire.
///
/// Framing errors (all but the msgpack variants, which only ever occur
/// while decoding a `CACHE_SHARE` or `CACHE_DIFF` body) are never fatal to
/// the transport — the caller drops the offending frame and continues.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid frame count: expected an envelope, an empty delimiter, a header and a body")]
    InvalidFrameCount,
    #[error("invalid header: expected {expected} bytes, got {actual}")]
    InvalidHeader { expected: usize, actual: usize },
    #[error("invalid body for msg type {0:?}: {1}")]
    InvalidBody(MsgType, String),
    #[error("msgpack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}
