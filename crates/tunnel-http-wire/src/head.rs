//! Sans-io HTTP/1.1 head parsing, built on `httparse`. Bodies are handled
//! separately by the caller once `content_length` is known.

use crate::error::HttpWireError;

const MAX_HEADERS: usize = 64;
/// Caps how many bytes of head we'll buffer before giving up — well past
/// anything a browser or well-behaved origin would send.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub version: u8,
    pub headers: Vec<HeaderField>,
}

#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub version: u8,
    pub headers: Vec<HeaderField>,
}

fn owned_headers(raw: &[httparse::Header<'_>]) -> Vec<HeaderField> {
    raw.iter()
        .map(|h| HeaderField {
            name: h.name.to_string(),
            value: String::from_utf8_lossy(h.value).into_owned(),
        })
        .collect()
}

/// Attempts to parse a request head from `buf`. Returns `Ok(None)` if more
/// bytes are needed; otherwise the parsed head and the byte offset of the
/// body's first byte.
pub fn parse_request_head(buf: &[u8]) -> Result<Option<(RequestHead, usize)>, HttpWireError> {
    if buf.len() > MAX_HEAD_BYTES {
        return Err(HttpWireError::HeadTooLarge(MAX_HEAD_BYTES));
    }
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut raw_headers);
    match req.parse(buf)? {
        httparse::Status::Partial => Ok(None),
        httparse::Status::Complete(consumed) => {
            let head = RequestHead {
                method: req.method.ok_or(HttpWireError::MissingRequestLine)?.to_string(),
                path: req.path.ok_or(HttpWireError::MissingRequestLine)?.to_string(),
                version: req.version.ok_or(HttpWireError::MissingRequestLine)?,
                headers: owned_headers(req.headers),
            };
            Ok(Some((head, consumed)))
        }
    }
}

/// Attempts to parse a response head from `buf`. Same incomplete/complete
/// contract as [`parse_request_head`].
pub fn parse_response_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, HttpWireError> {
    if buf.len() > MAX_HEAD_BYTES {
        return Err(HttpWireError::HeadTooLarge(MAX_HEAD_BYTES));
    }
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut resp = httparse::Response::new(&mut raw_headers);
    match resp.parse(buf)? {
        httparse::Status::Partial => Ok(None),
        httparse::Status::Complete(consumed) => {
            let head = ResponseHead {
                status: resp.code.ok_or(HttpWireError::MissingStatusLine)?,
                reason: resp.reason.unwrap_or("").to_string(),
                version: resp.version.ok_or(HttpWireError::MissingStatusLine)?,
                headers: owned_headers(resp.headers),
            };
            Ok(Some((head, consumed)))
        }
    }
}

pub fn header_value<'a>(headers: &'a [HeaderField], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn content_length(headers: &[HeaderField]) -> Option<usize> {
    header_value(headers, "content-length")?.trim().parse().ok()
}

pub fn is_chunked(headers: &[HeaderField]) -> bool {
    header_value(headers, "transfer-encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}
