//! The logical frame: envelope, header, body — as it travels between the
//! multipart wire codec and the stream dispatcher.

use bytes::Bytes;

use crate::body::Body;
use crate::error::ProtocolError;
use crate::header::Header;

/// `FRAME := ROUTING_PART* EMPTY_PART HEADER_PART BODY_PART`.
///
/// `envelope` holds zero or more routing parts preceding the empty
/// delimiter. The connection-oriented transport this workspace implements
/// never populates it, but decode accepts any number of parts so the frame
/// grammar itself stays general.
#[derive(Debug, Clone)]
pub struct Msg {
    pub envelope: Vec<Bytes>,
    pub header: Header,
    pub body: Body,
}

impl Msg {
    pub fn new(header: Header, body: Body) -> Self {
        Self {
            envelope: Vec::new(),
            header,
            body,
        }
    }

    pub fn with_envelope(envelope: Vec<Bytes>, header: Header, body: Body) -> Self {
        Self {
            envelope,
            header,
            body,
        }
    }

    /// Encode to the wire parts: envelope parts, an empty delimiter, the
    /// header part, then the body part.
    pub fn encode(&self) -> Result<Vec<Bytes>, ProtocolError> {
        let mut parts = Vec::with_capacity(self.envelope.len() + 3);
        parts.extend(self.envelope.iter().cloned());
        parts.push(Bytes::new());
        parts.push(self.header.encode());
        parts.push(self.body.encode()?);
        Ok(parts)
    }

    /// Decode from the wire parts. The first empty part found is treated as
    /// the envelope delimiter; exactly two parts (header, body) must follow.
    pub fn decode(parts: Vec<Bytes>) -> Result<Self, ProtocolError> {
        let delimiter = parts
            .iter()
            .position(|part| part.is_empty())
            .ok_or(ProtocolError::InvalidFrameCount)?;
        let envelope = parts[..delimiter].to_vec();
        let rest = &parts[delimiter + 1..];
        if rest.len() != 2 {
            return Err(ProtocolError::InvalidFrameCount);
        }
        let header = Header::decode(&rest[0])?;
        let body = Body::decode(header.msg_type, &rest[1])?;
        Ok(Self {
            envelope,
            header,
            body,
        })
    }

    pub fn is_stream_end(&self) -> bool {
        self.header.is_stream_end()
    }
}
