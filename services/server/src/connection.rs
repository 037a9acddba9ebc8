//! Demultiplexes one accepted transport connection: one outbound
//! serializer task plus a classify-and-dispatch loop on the inbound side.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use tunnel_protocol::{flags, Msg, MsgType};
use tunnel_workers::{HttpWorkerContext, StreamDispatcher, WorkerFactory};

use crate::state::ServerState;

const OUTBOUND_CAPACITY: usize = 32;

/// Runs until the peer disconnects or the connection errors out.
pub async fn handle(socket: TcpStream, peer_id: String, state: ServerState) {
    let framed = Framed::new(socket, tunnel_protocol::MultipartCodec::default());
    let (mut sink, mut stream) = framed.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Msg>(OUTBOUND_CAPACITY);

    let outbound_task = tokio::spawn(async move {
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

    let cache_worker_tx = tunnel_workers::cache_worker::spawn(peer_id.clone(), state.cache_manager.clone());

    let http_factory: WorkerFactory = {
        let ctx = HttpWorkerContext {
            client: state.http_client.clone(),
            cache: state.cache.clone(),
            cache_manager: state.cache_manager.clone(),
            peer_id: peer_id.clone(),
        };
        std::sync::Arc::new(move |stream_id, first, handles| {
            tunnel_workers::http_worker::spawn(stream_id, first, handles, ctx.clone())
        })
    };
    let http_dispatcher = StreamDispatcher::spawn(outbound_tx.clone(), http_factory);

    let tcp_cache = state.cache.clone();
    let tcp_factory: WorkerFactory = std::sync::Arc::new(move |stream_id, first, handles| {
        tunnel_workers::tcp_worker::spawn(stream_id, first, handles, tcp_cache.clone())
    });
    let tcp_dispatcher = StreamDispatcher::spawn(outbound_tx.clone(), tcp_factory);

    info!(peer = %peer_id, "connection accepted");

    while let Some(frame) = stream.next().await {
        let parts: Vec<Bytes> = match frame {
            Ok(parts) => parts,
            Err(err) => {
                warn!(peer = %peer_id, error = %err, "transport read error");
                break;
            }
        };
        let msg = match Msg::decode(parts) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(peer = %peer_id, error = %err, "failed to decode frame");
                continue;
            }
        };
        route(msg, &cache_worker_tx, &http_dispatcher, &tcp_dispatcher).await;
    }

    info!(peer = %peer_id, "connection closed");
    state.cache_manager.remove_peer(&peer_id);
    drop(outbound_tx);
    let _ = outbound_task.await;
}

async fn route(
    msg: Msg,
    cache_worker_tx: &mpsc::Sender<Msg>,
    http_dispatcher: &StreamDispatcher,
    tcp_dispatcher: &StreamDispatcher,
) {
    if msg.header.msg_type == MsgType::CacheShare {
        let _ = cache_worker_tx.send(msg).await;
        return;
    }
    if msg.header.has_flag(flags::HTTP) {
        if let Err(err) = http_dispatcher.dispatch(msg).await {
            warn!(error = %err, "http dispatcher unavailable");
        }
        return;
    }
    if let Err(err) = tcp_dispatcher.dispatch(msg).await {
        warn!(error = %err, "tcp dispatcher unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tunnel_protocol::{ContentType, Header, StreamId};

    fn data_msg(msg_type: MsgType, http: bool) -> Msg {
        let flag = if http { flags::HTTP | flags::TCP } else { flags::TCP };
        Msg::new(
            Header::new(StreamId::new(), msg_type, flag),
            tunnel_protocol::Body::TcpData {
                content_type: ContentType::Raw,
                payload: Bytes::new(),
            },
        )
    }

    /// A dispatcher whose factory hands every first frame straight to
    /// `seen`, with no worker task behind it — enough to prove `route`
    /// picked this dispatcher over the other one.
    fn recording_dispatcher() -> (StreamDispatcher, mpsc::Receiver<Msg>) {
        let (outbound_tx, _outbound_rx) = mpsc::channel(1);
        let (seen_tx, seen_rx) = mpsc::channel(4);
        let factory: WorkerFactory = std::sync::Arc::new(move |_stream_id, first, _handles| {
            let _ = seen_tx.try_send(first);
            let (worker_tx, _worker_rx) = mpsc::channel(1);
            worker_tx
        });
        (StreamDispatcher::spawn(outbound_tx, factory), seen_rx)
    }

    #[tokio::test]
    async fn cache_share_frames_go_to_the_cache_worker_channel() {
        let (cache_tx, mut cache_rx) = mpsc::channel(1);
        let (http_dispatcher, _http_seen) = recording_dispatcher();
        let (tcp_dispatcher, _tcp_seen) = recording_dispatcher();

        let msg = Msg::new(
            Header::new(StreamId::new(), MsgType::CacheShare, 0),
            tunnel_protocol::Body::CacheShare { items: vec![] },
        );
        route(msg, &cache_tx, &http_dispatcher, &tcp_dispatcher).await;

        let received = cache_rx.recv().await.expect("cache worker should receive the frame");
        assert_eq!(received.header.msg_type, MsgType::CacheShare);
    }

    #[tokio::test]
    async fn http_flagged_frames_reach_the_http_dispatcher_not_the_tcp_one() {
        let (cache_tx, _cache_rx) = mpsc::channel(1);
        let (http_dispatcher, mut http_seen) = recording_dispatcher();
        let (tcp_dispatcher, mut tcp_seen) = recording_dispatcher();

        let msg = data_msg(MsgType::TcpData, true);
        route(msg, &cache_tx, &http_dispatcher, &tcp_dispatcher).await;

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), http_seen.recv())
            .await
            .expect("http dispatcher should see the frame")
            .unwrap();
        assert!(received.header.has_flag(flags::HTTP));
        assert!(tcp_seen.try_recv().is_err(), "tcp dispatcher must not also receive it");
    }

    #[tokio::test]
    async fn plain_tcp_frames_reach_the_tcp_dispatcher_not_the_http_one() {
        let (cache_tx, _cache_rx) = mpsc::channel(1);
        let (http_dispatcher, mut http_seen) = recording_dispatcher();
        let (tcp_dispatcher, mut tcp_seen) = recording_dispatcher();

        let msg = data_msg(MsgType::TcpData, false);
        route(msg, &cache_tx, &http_dispatcher, &tcp_dispatcher).await;

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), tcp_seen.recv())
            .await
            .expect("tcp dispatcher should see the frame")
            .unwrap();
        assert!(!received.header.has_flag(flags::HTTP));
        assert!(http_seen.try_recv().is_err(), "http dispatcher must not also receive it");
    }
}
