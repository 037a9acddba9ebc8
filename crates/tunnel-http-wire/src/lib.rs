//! Minimal HTTP/1.1 request/response head codec, used to carry browser
//! traffic through the tunnel as opaque bytes without pulling in a full
//! server framework.

pub mod error;
pub mod head;
pub mod serialize;

pub use error::HttpWireError;
pub use head::{
    content_length, header_value, is_chunked, parse_request_head, parse_response_head,
    HeaderField, RequestHead, ResponseHead, MAX_HEAD_BYTES,
};
pub use serialize::{serialize_request_head, serialize_response_head};
