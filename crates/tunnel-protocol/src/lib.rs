//! Wire framing for diff-tunnel: the fixed header, the tagged body union,
//! the msgpack `DiffContent` record, and the multipart codec that carries
//! them over a connection.

pub mod body;
pub mod diff_content;
pub mod error;
pub mod header;
pub mod msg;
pub mod wire_codec;

pub use body::{Body, CacheShareItem, ContentType};
pub use diff_content::DiffContent;
pub use error::ProtocolError;
pub use header::{flags, Header, MsgType, StreamId, HEADER_SIZE, PROTOCOL_VERSION};
pub use msg::Msg;
pub use wire_codec::MultipartCodec;
