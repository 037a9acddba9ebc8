use tunnel_cache::{Cache, CacheManager};

/// Resources shared by every connection a `TunnelServer` accepts: the
/// content cache, the per-peer digest mirror, and the client used for
/// origin round trips.
#[derive(Clone)]
pub struct ServerState {
    pub cache: Cache,
    pub cache_manager: CacheManager,
    pub http_client: reqwest::Client,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            cache: Cache::new(),
            cache_manager: CacheManager::new(),
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
