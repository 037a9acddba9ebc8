//! Bridges a byte-stream write interface to the message-oriented outbound
//! channel shared by every stream on a connection.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tunnel_cache::CacheCompressor;
use tunnel_protocol::{flags, Body, ContentType, Header, Msg, MsgType, StreamId};

use crate::error::TunnelIoError;

/// Writes `TCP_DATA` frames for one stream id onto a shared outbound
/// channel. Every write is its own frame; the transport preserves order
/// but may batch frames at the socket level.
#[derive(Clone)]
pub struct TunnelWriter {
    outbound: mpsc::Sender<Msg>,
    stream_id: StreamId,
    interior_flags: u16,
}

impl TunnelWriter {
    pub fn new(outbound: mpsc::Sender<Msg>, stream_id: StreamId, interior_flags: u16) -> Self {
        Self {
            outbound,
            stream_id,
            interior_flags,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    async fn send(&self, content_type: ContentType, payload: Bytes, terminal: bool) -> Result<(), TunnelIoError> {
        let flag = if terminal {
            self.interior_flags | flags::STREAM_END
        } else {
            self.interior_flags
        };
        let header = Header::new(self.stream_id, MsgType::TcpData, flag);
        let body = Body::TcpData {
            content_type,
            payload,
        };
        self.outbound
            .send(Msg::new(header, body))
            .await
            .map_err(|_| TunnelIoError::ChannelClosed)
    }

    pub async fn write(&self, payload: Bytes) -> Result<(), TunnelIoError> {
        self.send(ContentType::Raw, payload, false).await
    }

    pub async fn close(&self) -> Result<(), TunnelIoError> {
        self.send(ContentType::Raw, Bytes::new(), true).await
    }

    pub async fn write_cache_diff(&self, payload: Bytes) -> Result<(), TunnelIoError> {
        self.send(ContentType::CacheDiff, payload, true).await
    }

    pub async fn fail(&self, message: impl Into<String>) -> Result<(), TunnelIoError> {
        let header = Header::new(self.stream_id, MsgType::Error, flags::STREAM_END);
        let body = Body::Error {
            content_type: ContentType::Raw,
            payload: Bytes::from(message.into().into_bytes()),
        };
        self.outbound
            .send(Msg::new(header, body))
            .await
            .map_err(|_| TunnelIoError::ChannelClosed)
    }
}

const MAX_CACHE_SIZE: usize = 5 * 1024 * 1024;
const MAX_CACHE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

enum Mode {
    Buffering { buffer: BytesMut, deadline: tokio::time::Instant },
    Streaming,
}

/// Buffers a response in-memory to give the compressor a full body to
/// diff, but abandons buffering (and the benefit of compression) once the
/// body exceeds [`MAX_CACHE_SIZE`] or 2 seconds have elapsed.
pub struct CachedTunnelWriter {
    inner: TunnelWriter,
    compressor: Option<CacheCompressor>,
    mode: Mode,
}

impl CachedTunnelWriter {
    pub fn new(inner: TunnelWriter, compressor: CacheCompressor) -> Self {
        Self {
            inner,
            compressor: Some(compressor),
            mode: Mode::Buffering {
                buffer: BytesMut::new(),
                deadline: tokio::time::Instant::now() + MAX_CACHE_DELAY,
            },
        }
    }

    pub async fn write(&mut self, payload: Bytes) -> Result<(), TunnelIoError> {
        match &mut self.mode {
            Mode::Streaming => self.inner.write(payload).await,
            Mode::Buffering { buffer, deadline } => {
                let over_budget = buffer.len() + payload.len() > MAX_CACHE_SIZE;
                let expired = tokio::time::Instant::now() >= *deadline;
                if over_budget || expired {
                    let flushed = buffer.split().freeze();
                    self.mode = Mode::Streaming;
                    if !flushed.is_empty() {
                        self.inner.write(flushed).await?;
                    }
                    self.inner.write(payload).await
                } else {
                    buffer.extend_from_slice(&payload);
                    Ok(())
                }
            }
        }
    }

    pub async fn close(mut self) -> Result<(), TunnelIoError> {
        match self.mode {
            Mode::Streaming => self.inner.close().await,
            Mode::Buffering { buffer, .. } => {
                let compressor = self.compressor.take().expect("compressor consumed once");
                let content = compressor
                    .compress(&buffer)
                    .map_err(TunnelIoError::Cache)?;
                let payload = Bytes::from(content.encode().map_err(TunnelIoError::Protocol)?);
                self.inner.write_cache_diff(payload).await
            }
        }
    }
}
