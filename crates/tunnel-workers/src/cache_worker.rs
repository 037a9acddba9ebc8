//! Consumes `CACHE_SHARE` announcements for one connection and mirrors
//! them into that peer's entry in the shared [`CacheManager`].

use tokio::sync::mpsc;
use tracing::debug;
use tunnel_cache::CacheManager;
use tunnel_protocol::{Body, Msg};

/// Spawns the long-lived cache worker task for `peer_id` and returns the
/// channel its connection's demux loop should forward `CACHE_SHARE`
/// frames into. The worker never replies.
pub fn spawn(peer_id: String, cache_manager: CacheManager) -> mpsc::Sender<Msg> {
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Body::CacheShare { items } = msg.body else {
                continue;
            };
            for item in items {
                debug!(peer = %peer_id, cache_key = ?item.cache_key, "cache share");
                cache_manager.update_peer(&peer_id, item.cache_key, item.digest);
            }
        }
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnel_protocol::{CacheShareItem, Header, MsgType, StreamId};

    #[tokio::test]
    async fn upserts_every_item_in_a_cache_share_frame() {
        let cache_manager = CacheManager::new();
        let tx = spawn("peer-a".to_string(), cache_manager.clone());

        let msg = Msg::new(
            Header::new(StreamId::new(), MsgType::CacheShare, 0),
            Body::CacheShare {
                items: vec![
                    CacheShareItem {
                        cache_key: b"http://example.com".to_vec(),
                        digest: vec![1, 2, 3],
                    },
                    CacheShareItem {
                        cache_key: b"http://httpbin.org".to_vec(),
                        digest: vec![4, 5, 6],
                    },
                ],
            },
        );
        tx.send(msg).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(
            cache_manager.get_peer_digest("peer-a", b"http://example.com"),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            cache_manager.get_peer_digest("peer-a", b"http://httpbin.org"),
            Some(vec![4, 5, 6])
        );
    }
}
