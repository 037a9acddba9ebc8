//! `TunnelClient`: one outbound task and one inbound dispatch task per
//! connection to a remote `TunnelServer`, exposing `connect_tcp` and
//! `round_trip` to the local HTTP proxy front-end.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};
use tunnel_cache::Cache;
use tunnel_io::{CachedTunnelReader, TunnelReader, TunnelWriter};
use tunnel_protocol::{flags, Body, CacheShareItem, Header, Msg, MsgType, MultipartCodec, StreamId};

use crate::error::ClientError;

const STREAM_CHANNEL_CAPACITY: usize = 10;
const OUTBOUND_CAPACITY: usize = 32;

type ReplyRegistry = Arc<RwLock<HashMap<StreamId, mpsc::Sender<Msg>>>>;

#[derive(Clone)]
pub struct TunnelClient {
    outbound: mpsc::Sender<Msg>,
    registry: ReplyRegistry,
    cache: Cache,
}

impl TunnelClient {
    /// Dials `addr`, then spawns the connection's outbound serializer and
    /// inbound dispatch tasks.
    pub async fn connect(addr: &str, cache: Cache) -> Result<Self, ClientError> {
        let socket = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_owned(),
                source,
            })?;
        let framed = Framed::new(socket, MultipartCodec::default());
        let (mut sink, mut stream) = framed.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Msg>(OUTBOUND_CAPACITY);
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let parts = match msg.encode() {
                    Ok(parts) => parts,
                    Err(err) => {
                        warn!(error = %err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if sink.send(parts).await.is_err() {
                    break;
                }
            }
        });

        let registry: ReplyRegistry = Arc::new(RwLock::new(HashMap::new()));
        let inbound_registry = registry.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let parts = match frame {
                    Ok(parts) => parts,
                    Err(err) => {
                        warn!(error = %err, "transport read error");
                        break;
                    }
                };
                let msg = match Msg::decode(parts) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(error = %err, "failed to decode frame");
                        continue;
                    }
                };
                let stream_id = msg.header.stream_id;
                let stream_end = msg.header.is_stream_end();
                let reply_tx = inbound_registry.read().unwrap().get(&stream_id).cloned();
                match reply_tx {
                    Some(tx) => {
                        let _ = tx.send(msg).await;
                    }
                    None => debug!(%stream_id, "dropping frame for unknown stream"),
                }
                if stream_end {
                    inbound_registry.write().unwrap().remove(&stream_id);
                }
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            registry,
            cache,
        })
    }

    fn register(&self, stream_id: StreamId) -> mpsc::Receiver<Msg> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        self.registry.write().unwrap().insert(stream_id, tx);
        rx
    }

    /// Opens a new logical TCP stream through the tunnel and waits for the
    /// server's `TCP_CONNECT_REP`/`ERROR` before returning.
    pub async fn connect_tcp(&self, host: &str) -> Result<(TunnelReader, TunnelWriter), ClientError> {
        let stream_id = StreamId::new();
        let mut rx = self.register(stream_id);

        let connect = Msg::new(
            Header::new(stream_id, MsgType::TcpConnect, flags::TCP | flags::STREAM_BEGIN),
            Body::TcpData {
                content_type: tunnel_protocol::ContentType::Raw,
                payload: Bytes::from(host.to_owned().into_bytes()),
            },
        );
        self.outbound
            .send(connect)
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;

        let first = rx.recv().await.ok_or(ClientError::ConnectionClosed)?;
        if let Body::Error { payload, .. } = &first.body {
            self.registry.write().unwrap().remove(&stream_id);
            return Err(ClientError::RemoteRejected(
                String::from_utf8_lossy(payload).into_owned(),
            ));
        }

        let reader = TunnelReader::new(rx, self.cache.clone());
        let writer = TunnelWriter::new(self.outbound.clone(), stream_id, flags::TCP);
        Ok((reader, writer))
    }

    /// Proxies one HTTP request. If the local cache already holds a body for
    /// `cache_key`, its digest is advertised first via `CACHE_SHARE` so the
    /// server can reply with a diff instead of the full body.
    pub async fn round_trip(
        &self,
        cache_key: Vec<u8>,
        request_head: Vec<u8>,
        request_body: Vec<u8>,
    ) -> Result<CachedTunnelReader, ClientError> {
        let stream_id = StreamId::new();
        let rx = self.register(stream_id);

        if let Some(digest) = self.cache.get_digest(&cache_key) {
            let share = Msg::new(
                Header::new(stream_id, MsgType::CacheShare, 0),
                Body::CacheShare {
                    items: vec![CacheShareItem {
                        cache_key: cache_key.clone(),
                        digest,
                    }],
                },
            );
            let _ = self.outbound.send(share).await;
        }

        let writer = TunnelWriter::new(self.outbound.clone(), stream_id, flags::HTTP | flags::TCP);
        let mut payload = request_head;
        payload.extend_from_slice(&request_body);
        writer.write(Bytes::from(payload)).await?;
        writer.close().await?;

        let inner = TunnelReader::new(rx, self.cache.clone());
        Ok(CachedTunnelReader::new(inner, self.cache.clone(), cache_key))
    }
}
