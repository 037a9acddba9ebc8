//! Renders a request/response head back to its HTTP/1.1 wire form.

use crate::head::HeaderField;

pub fn serialize_request_head(method: &str, path: &str, headers: &[HeaderField]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + headers.len() * 32);
    out.extend_from_slice(method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(path.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");
    write_headers(&mut out, headers);
    out
}

pub fn serialize_response_head(status: u16, reason: &str, headers: &[HeaderField]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + headers.len() * 32);
    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(reason.as_bytes());
    out.extend_from_slice(b"\r\n");
    write_headers(&mut out, headers);
    out
}

fn write_headers(out: &mut Vec<u8>, headers: &[HeaderField]) {
    for header in headers {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(header.value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::parse_response_head;

    #[test]
    fn serialized_response_head_reparses_cleanly() {
        let headers = vec![HeaderField {
            name: "Content-Length".to_string(),
            value: "5".to_string(),
        }];
        let raw = serialize_response_head(200, "OK", &headers);
        let (head, consumed) = parse_response_head(&raw).unwrap().unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(consumed, raw.len());
    }
}
