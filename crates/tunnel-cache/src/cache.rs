//! The local content-addressed cache: `cacheKey -> body`, with digests
//! computed on demand rather than stored.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::digest::digest;

/// Thread-safe `cacheKey -> body` store. Cheap to clone; clones share the
/// same backing map.
#[derive(Clone, Default)]
pub struct Cache {
    inner: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) {
        self.inner.write().unwrap().insert(key, value);
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().unwrap().get(key).cloned()
    }

    /// The MD5 digest of the body stored under `key`, if present.
    pub fn get_digest(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().unwrap().get(key).map(|body| digest(body))
    }

    pub fn del(&self, key: &[u8]) -> bool {
        self.inner.write().unwrap().remove(key).is_some()
    }
}
