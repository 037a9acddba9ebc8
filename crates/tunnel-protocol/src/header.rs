//! The 18-byte fixed frame header and the stream identifier it carries.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::ProtocolError;

pub const HEADER_SIZE: usize = 18;
pub const PROTOCOL_VERSION: u8 = 1;

/// Header flag bits. A frame may carry more than one.
pub mod flags {
    pub const TCP: u16 = 0x0001;
    pub const UDP: u16 = 0x0002;
    pub const HTTP: u16 = 0x0004;
    pub const STREAM_BEGIN: u16 = 0x0008;
    pub const STREAM_END: u16 = 0x0010;
}

/// The 12-byte opaque stream identifier, drawn from a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId([u8; 12]);

impl StreamId {
    /// Mint a fresh id from the first 12 bytes of a random UUID.
    pub fn new() -> Self {
        let uuid = Uuid::new_v4();
        let mut id = [0u8; 12];
        id.copy_from_slice(&uuid.as_bytes()[..12]);
        Self(id)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// One of the five wire message types. `msgType` in the header dispatches
/// which `Body` variant follows. `Unknown` carries the raw value through so
/// decode can defer rejection to `Body::decode`, per spec.md §4.1: header
/// decode only fails on wrong length, unknown `msgType` is an `InvalidBody`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    TcpConnect,
    TcpConnectRep,
    TcpData,
    CacheShare,
    Error,
    Unknown(u16),
}

impl MsgType {
    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => Self::TcpConnect,
            2 => Self::TcpConnectRep,
            3 => Self::TcpData,
            21 => Self::CacheShare,
            255 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::TcpConnect => 1,
            Self::TcpConnectRep => 2,
            Self::TcpData => 3,
            Self::CacheShare => 21,
            Self::Error => 255,
            Self::Unknown(v) => v,
        }
    }
}

/// The fixed 18-byte header preceding every frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub stream_id: StreamId,
    pub msg_type: MsgType,
    pub flag: u16,
    pub reserved: u8,
}

impl Header {
    pub fn new(stream_id: StreamId, msg_type: MsgType, flag: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            stream_id,
            msg_type,
            flag,
            reserved: 0,
        }
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flag & flag != 0
    }

    pub fn is_stream_begin(&self) -> bool {
        self.has_flag(flags::STREAM_BEGIN)
    }

    pub fn is_stream_end(&self) -> bool {
        self.has_flag(flags::STREAM_END)
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_u8(self.version);
        buf.put_slice(self.stream_id.as_bytes());
        buf.put_u16(self.msg_type.to_u16());
        buf.put_u16(self.flag);
        buf.put_u8(self.reserved);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != HEADER_SIZE {
            return Err(ProtocolError::InvalidHeader {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut buf = data;
        let version = buf.get_u8();
        let mut stream_id = [0u8; 12];
        stream_id.copy_from_slice(&buf[..12]);
        buf.advance(12);
        let msg_type_raw = buf.get_u16();
        let flag = buf.get_u16();
        let reserved = buf.get_u8();
        let msg_type = MsgType::from_u16(msg_type_raw);
        Ok(Self {
            version,
            stream_id: StreamId::from_bytes(stream_id),
            msg_type,
            flag,
            reserved,
        })
    }
}
