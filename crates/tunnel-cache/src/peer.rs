//! Server-side mirror of the digests a remote peer is believed to hold,
//! fed by `CACHE_SHARE` announcements.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A plain `cacheKey -> digest` mapping for one peer.
#[derive(Clone, Default)]
pub struct PeerCache {
    entries: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl PeerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Vec<u8>, digest: Vec<u8>) {
        self.entries.write().unwrap().insert(key, digest);
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.read().unwrap().get(key).cloned()
    }
}

/// Owns the one local [`Cache`](crate::cache::Cache) and a `peerId ->
/// PeerCache` registry. Every peer is bound to its transport connection's
/// identity rather than a hardcoded name, so concurrent peers don't share
/// a digest mirror.
#[derive(Clone, Default)]
pub struct CacheManager {
    peers: Arc<RwLock<HashMap<String, PeerCache>>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn peer_cache(&self, peer_id: &str) -> PeerCache {
        {
            let peers = self.peers.read().unwrap();
            if let Some(peer) = peers.get(peer_id) {
                return peer.clone();
            }
        }
        let mut peers = self.peers.write().unwrap();
        peers.entry(peer_id.to_string()).or_default().clone()
    }

    pub fn get_peer_digest(&self, peer_id: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.peer_cache(peer_id).get(key)
    }

    pub fn update_peer(&self, peer_id: &str, key: Vec<u8>, digest: Vec<u8>) {
        self.peer_cache(peer_id).set(key, digest);
    }

    pub fn remove_peer(&self, peer_id: &str) {
        self.peers.write().unwrap().remove(peer_id);
    }
}
