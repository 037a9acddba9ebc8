//! Bridges the message-oriented inbound channel for one stream to a plain
//! byte-stream read interface.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tunnel_cache::{Cache, CacheDecompressor};
use tunnel_protocol::{Body, ContentType, DiffContent, Msg};

use crate::error::TunnelIoError;

/// Reads frames off a stream's inbound channel, reconstructing
/// `CACHE_DIFF` bodies against the local cache and surfacing `ERROR`
/// frames as a read failure.
pub struct TunnelReader {
    inbound: mpsc::Receiver<Msg>,
    decompressor: CacheDecompressor,
    tail: BytesMut,
    eof: bool,
}

impl TunnelReader {
    pub fn new(inbound: mpsc::Receiver<Msg>, cache: Cache) -> Self {
        Self {
            inbound,
            decompressor: CacheDecompressor::new(cache),
            tail: BytesMut::new(),
            eof: false,
        }
    }

    /// Like [`Self::new`], but seeds the reader with a frame that has
    /// already been pulled off the channel (the worker's dispatch frame).
    pub fn with_first_frame(inbound: mpsc::Receiver<Msg>, cache: Cache, first: Msg) -> Result<Self, TunnelIoError> {
        let mut reader = Self::new(inbound, cache);
        reader.absorb(first)?;
        Ok(reader)
    }

    fn absorb(&mut self, msg: Msg) -> Result<(), TunnelIoError> {
        let stream_end = msg.header.is_stream_end();
        match msg.body {
            Body::Error { payload, .. } => {
                return Err(TunnelIoError::Remote(String::from_utf8_lossy(&payload).into_owned()));
            }
            Body::TcpData {
                content_type,
                payload,
            } => {
                if !payload.is_empty() {
                    let body = match content_type {
                        ContentType::Raw => payload.to_vec(),
                        ContentType::CacheDiff => {
                            let content = DiffContent::decode(&payload)?;
                            self.decompressor.decompress(&content)?
                        }
                    };
                    self.tail.extend_from_slice(&body);
                }
            }
            Body::CacheShare { .. } => {}
        }
        if stream_end {
            self.eof = true;
        }
        Ok(())
    }

    async fn fill(&mut self) -> Result<(), TunnelIoError> {
        while self.tail.is_empty() && !self.eof {
            match self.inbound.recv().await {
                Some(msg) => self.absorb(msg)?,
                None => {
                    self.eof = true;
                }
            }
        }
        Ok(())
    }

    /// Reads up to `max` bytes of reconstructed body. `Ok(None)` means the
    /// stream has ended and the internal tail is drained.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TunnelIoError> {
        self.fill().await?;
        if self.tail.is_empty() {
            return Ok(None);
        }
        let n = max.min(self.tail.len());
        Ok(Some(self.tail.split_to(n).freeze()))
    }

    /// Reads the entire remaining body in one call.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, TunnelIoError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read_chunk(usize::MAX).await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Wraps [`TunnelReader`], mirroring every byte read into a buffer so the
/// full body can be cached under `cache_key` once the stream ends.
pub struct CachedTunnelReader {
    inner: TunnelReader,
    cache: Cache,
    cache_key: Vec<u8>,
    buffer: BytesMut,
    stored: bool,
}

impl CachedTunnelReader {
    pub fn new(inner: TunnelReader, cache: Cache, cache_key: Vec<u8>) -> Self {
        Self {
            inner,
            cache,
            cache_key,
            buffer: BytesMut::new(),
            stored: false,
        }
    }

    pub async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TunnelIoError> {
        match self.inner.read_chunk(max).await? {
            Some(chunk) => {
                self.buffer.extend_from_slice(&chunk);
                Ok(Some(chunk))
            }
            None => {
                self.store();
                Ok(None)
            }
        }
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, TunnelIoError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read_chunk(usize::MAX).await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    fn store(&mut self) {
        if !self.stored {
            self.cache.set(self.cache_key.clone(), self.buffer.to_vec());
            self.stored = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnel_protocol::{flags, Header, MsgType, StreamId};

    fn data_msg(payload: &[u8], content_type: ContentType, end: bool) -> Msg {
        let flag = if end { flags::TCP | flags::STREAM_END } else { flags::TCP };
        Msg::new(
            Header::new(StreamId::new(), MsgType::TcpData, flag),
            Body::TcpData {
                content_type,
                payload: Bytes::copy_from_slice(payload),
            },
        )
    }

    #[tokio::test]
    async fn reads_raw_frames_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let mut reader = TunnelReader::new(rx, Cache::new());
        tx.send(data_msg(b"hello ", ContentType::Raw, false)).await.unwrap();
        tx.send(data_msg(b"world", ContentType::Raw, true)).await.unwrap();

        let body = reader.read_to_end().await.unwrap();
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn empty_stream_end_frame_is_eof() {
        let (tx, rx) = mpsc::channel(8);
        let mut reader = TunnelReader::new(rx, Cache::new());
        tx.send(data_msg(b"", ContentType::Raw, true)).await.unwrap();
        assert!(reader.read_chunk(16).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_frame_fails_the_read() {
        let (tx, rx) = mpsc::channel(8);
        let mut reader = TunnelReader::new(rx, Cache::new());
        tx.send(Msg::new(
            Header::new(StreamId::new(), MsgType::Error, flags::STREAM_END),
            Body::Error {
                content_type: ContentType::Raw,
                payload: Bytes::from_static(b"origin unreachable"),
            },
        ))
        .await
        .unwrap();

        let err = reader.read_chunk(16).await.unwrap_err();
        assert!(matches!(err, TunnelIoError::Remote(msg) if msg == "origin unreachable"));
    }

    #[tokio::test]
    async fn cache_diff_frame_reconstructs_against_baseline() {
        let cache = Cache::new();
        cache.set(b"k".to_vec(), b"old body".to_vec());
        let baseline_digest = tunnel_cache::digest(b"old body");
        let diff = tunnel_cache::make_diff(b"old body", b"new body longer").unwrap();
        let content = DiffContent {
            cache_key: b"k".to_vec(),
            patch_to: baseline_digest,
            diff,
        };
        let payload = Bytes::from(content.encode().unwrap());

        let (tx, rx) = mpsc::channel(8);
        let mut reader = TunnelReader::new(rx, cache);
        tx.send(data_msg(&payload, ContentType::CacheDiff, true)).await.unwrap();

        let body = reader.read_to_end().await.unwrap();
        assert_eq!(body, b"new body longer");
    }

    #[tokio::test]
    async fn cached_reader_stores_full_body_on_eof() {
        let cache = Cache::new();
        let (tx, rx) = mpsc::channel(8);
        let inner = TunnelReader::new(rx, cache.clone());
        let mut reader = CachedTunnelReader::new(inner, cache.clone(), b"key".to_vec());

        tx.send(data_msg(b"cached body", ContentType::Raw, true)).await.unwrap();
        let body = reader.read_to_end().await.unwrap();
        assert_eq!(body, b"cached body");
        assert_eq!(cache.get(b"key"), Some(b"cached body".to_vec()));
    }
}
