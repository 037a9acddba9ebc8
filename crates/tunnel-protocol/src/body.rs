//! The tagged body union that follows a [`Header`](crate::header::Header).
//!
//! Which variant a frame carries is determined entirely by `msgType`, never
//! by data inside the body itself.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::error::ProtocolError;
use crate::header::MsgType;

/// Tags how a `TcpData`/`Error` payload should be interpreted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Payload is the raw bytes, no diffing involved.
    Raw = 0,
    /// Payload is a msgpack-encoded [`DiffContent`](crate::diff_content::DiffContent).
    CacheDiff = 1,
}

impl ContentType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Raw),
            1 => Some(Self::CacheDiff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheShareItemWire {
    #[serde(rename = "CacheKey")]
    cache_key: ByteBuf,
    #[serde(rename = "Digest")]
    digest: ByteBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheShareWire {
    #[serde(rename = "Payload")]
    payload: Vec<CacheShareItemWire>,
}

/// One entry in a `CACHE_SHARE` announcement: a cache key this peer already
/// holds, and the digest of the content it last saw under that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheShareItem {
    pub cache_key: Vec<u8>,
    pub digest: Vec<u8>,
}

/// The payload that follows a [`Header`]; which variant is valid for a given
/// frame is dictated by `header.msg_type`.
#[derive(Debug, Clone)]
pub enum Body {
    /// Carried by `TCP_CONNECT`, `TCP_CONNECT_REP`, and `TCP_DATA`.
    TcpData {
        content_type: ContentType,
        payload: Bytes,
    },
    /// Carried by `CACHE_SHARE`: the sender's known cache contents.
    CacheShare { items: Vec<CacheShareItem> },
    /// Carried by `ERROR`.
    Error {
        content_type: ContentType,
        payload: Bytes,
    },
}

const CONTENT_TYPE_PREFIX_LEN: usize = 2;

impl Body {
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Body::TcpData {
                content_type,
                payload,
            }
            | Body::Error {
                content_type,
                payload,
            } => {
                let mut out = Vec::with_capacity(CONTENT_TYPE_PREFIX_LEN + payload.len());
                out.extend_from_slice(&(*content_type as u16).to_be_bytes());
                out.extend_from_slice(payload);
                Ok(Bytes::from(out))
            }
            Body::CacheShare { items } => {
                let wire = CacheShareWire {
                    payload: items
                        .iter()
                        .map(|item| CacheShareItemWire {
                            cache_key: ByteBuf::from(item.cache_key.clone()),
                            digest: ByteBuf::from(item.digest.clone()),
                        })
                        .collect(),
                };
                Ok(Bytes::from(rmp_serde::to_vec_named(&wire)?))
            }
        }
    }

    pub fn decode(msg_type: MsgType, data: &[u8]) -> Result<Self, ProtocolError> {
        match msg_type {
            MsgType::TcpConnect | MsgType::TcpConnectRep | MsgType::TcpData => {
                let (content_type, payload) = decode_content_tagged(msg_type, data)?;
                Ok(Body::TcpData {
                    content_type,
                    payload,
                })
            }
            MsgType::Error => {
                let (content_type, payload) = decode_content_tagged(msg_type, data)?;
                Ok(Body::Error {
                    content_type,
                    payload,
                })
            }
            MsgType::CacheShare => {
                let wire: CacheShareWire = rmp_serde::from_slice(data)?;
                Ok(Body::CacheShare {
                    items: wire
                        .payload
                        .into_iter()
                        .map(|item| CacheShareItem {
                            cache_key: item.cache_key.into_vec(),
                            digest: item.digest.into_vec(),
                        })
                        .collect(),
                })
            }
            MsgType::Unknown(raw) => Err(ProtocolError::InvalidBody(
                MsgType::Unknown(raw),
                format!("unknown message type {raw}"),
            )),
        }
    }
}

fn decode_content_tagged(
    msg_type: MsgType,
    data: &[u8],
) -> Result<(ContentType, Bytes), ProtocolError> {
    if data.len() < CONTENT_TYPE_PREFIX_LEN {
        return Err(ProtocolError::InvalidBody(
            msg_type,
            "body shorter than the content-type prefix".to_string(),
        ));
    }
    let raw = u16::from_be_bytes([data[0], data[1]]);
    let content_type = ContentType::from_u16(raw).ok_or_else(|| {
        ProtocolError::InvalidBody(msg_type, format!("unknown content type {raw}"))
    })?;
    Ok((content_type, Bytes::copy_from_slice(&data[CONTENT_TYPE_PREFIX_LEN..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_data_round_trips() {
        let body = Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::from_static(b"GET / HTTP/1.1\r\n\r\n"),
        };
        let encoded = body.encode().unwrap();
        let decoded = Body::decode(MsgType::TcpData, &encoded).unwrap();
        match decoded {
            Body::TcpData {
                content_type,
                payload,
            } => {
                assert_eq!(content_type, ContentType::Raw);
                assert_eq!(&payload[..], b"GET / HTTP/1.1\r\n\r\n");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn cache_share_round_trips() {
        let body = Body::CacheShare {
            items: vec![CacheShareItem {
                cache_key: b"http://example.com/x".to_vec(),
                digest: vec![0xaa; 16],
            }],
        };
        let encoded = body.encode().unwrap();
        let decoded = Body::decode(MsgType::CacheShare, &encoded).unwrap();
        match decoded {
            Body::CacheShare { items } => assert_eq!(items.len(), 1),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_short_content_tagged_body() {
        let err = Body::decode(MsgType::TcpData, &[0u8]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBody(MsgType::TcpData, _)));
    }

    #[test]
    fn unknown_msg_type_is_invalid_body_not_a_header_failure() {
        let err = Body::decode(MsgType::Unknown(99), &[0u8, 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBody(MsgType::Unknown(99), _)));
    }
}
