//! [`tokio_util::codec`] adapter carrying a multipart frame's parts over a
//! single `TcpStream`, for use with `Framed<TcpStream, MultipartCodec>`.
//!
//! Wire layout: `u16` part count, then per part a `u32` length prefix
//! followed by that many bytes. This is below the `Msg`/`Header`/`Body`
//! layer — it only knows about byte strings, not frame semantics.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Caps a single frame's total size so a corrupt or hostile length prefix
/// can't drive an unbounded allocation.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct MultipartCodec {
    part_count: Option<u16>,
    parts: Vec<Bytes>,
    current_len: Option<u32>,
}

impl MultipartCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.part_count = None;
        self.parts.clear();
        self.current_len = None;
    }
}

impl Decoder for MultipartCodec {
    type Item = Vec<Bytes>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let part_count = match self.part_count {
                Some(n) => n,
                None => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    let n = src.get_u16();
                    self.part_count = Some(n);
                    n
                }
            };

            if self.parts.len() as u16 == part_count {
                let parts = std::mem::take(&mut self.parts);
                self.reset();
                return Ok(Some(parts));
            }

            let len = match self.current_len {
                Some(len) => len,
                None => {
                    if src.len() < 4 {
                        return Ok(None);
                    }
                    let len = src.get_u32();
                    if len as usize > MAX_FRAME_BYTES {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("frame part of {len} bytes exceeds the {MAX_FRAME_BYTES} byte cap"),
                        ));
                    }
                    self.current_len = Some(len);
                    len
                }
            };

            if src.len() < len as usize {
                return Ok(None);
            }
            let part = src.split_to(len as usize).freeze();
            self.parts.push(part);
            self.current_len = None;
        }
    }
}

impl Encoder<Vec<Bytes>> for MultipartCodec {
    type Error = std::io::Error;

    fn encode(&mut self, parts: Vec<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if parts.len() > u16::MAX as usize {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "too many frame parts",
            ));
        }
        dst.put_u16(parts.len() as u16);
        for part in parts {
            dst.put_u32(part.len() as u32);
            dst.put_slice(&part);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_multipart_frame() {
        let mut codec = MultipartCodec::new();
        let parts = vec![
            Bytes::new(),
            Bytes::from_static(b"header-bytes"),
            Bytes::from_static(b"body-bytes"),
        ];

        let mut buf = BytesMut::new();
        codec.encode(parts.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, parts);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_more_bytes() {
        let mut codec = MultipartCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u16(2);
        buf.put_u32(4);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_oversized_part() {
        let mut codec = MultipartCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        buf.put_u32((MAX_FRAME_BYTES + 1) as u32);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
