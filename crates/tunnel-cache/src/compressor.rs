//! The compression/decompression pipeline coupling a response body to the
//! local [`Cache`] and a peer's advertised digest.

use tunnel_protocol::DiffContent;

use crate::cache::Cache;
use crate::delta::{apply_patch, make_diff};
use crate::digest::digest;
use crate::error::CacheError;

/// Diffs a full body against whatever baseline the cache holds for
/// `cache_key`, if that baseline matches the peer's advertised digest.
pub struct CacheCompressor {
    cache: Cache,
    cache_key: Vec<u8>,
    advertised_digest: Vec<u8>,
    update_cache: bool,
}

impl CacheCompressor {
    pub fn new(
        cache: Cache,
        cache_key: Vec<u8>,
        advertised_digest: Vec<u8>,
        update_cache: bool,
    ) -> Self {
        Self {
            cache,
            cache_key,
            advertised_digest,
            update_cache,
        }
    }

    /// Consumes the full body and produces the `DiffContent` to put on the
    /// wire. Always a diff against the cached baseline when one matches the
    /// peer's advertised digest; otherwise the full body with an empty
    /// `patch_to`.
    pub fn compress(self, body: &[u8]) -> Result<DiffContent, CacheError> {
        let cached = self.cache.get(&self.cache_key);
        let hit = cached
            .as_deref()
            .map(|cached| digest(cached) == self.advertised_digest)
            .unwrap_or(false)
            && !self.advertised_digest.is_empty();

        let content = if hit {
            let diff = make_diff(cached.as_deref().unwrap_or_default(), body)?;
            DiffContent {
                cache_key: self.cache_key.clone(),
                patch_to: self.advertised_digest.clone(),
                diff,
            }
        } else {
            DiffContent::full_body(Vec::new(), body.to_vec())
        };

        if self.update_cache {
            self.cache.set(self.cache_key, body.to_vec());
        }
        Ok(content)
    }
}

/// Reconstructs a full body from a received `DiffContent`, updating the
/// local cache on success.
pub struct CacheDecompressor {
    cache: Cache,
}

impl CacheDecompressor {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    pub fn decompress(&self, content: &DiffContent) -> Result<Vec<u8>, CacheError> {
        if !content.has_baseline() {
            return Ok(content.diff.clone());
        }
        let cached = self
            .cache
            .get(&content.cache_key)
            .filter(|cached| digest(cached) == content.patch_to)
            .ok_or(CacheError::BaselineMissing)?;
        let body = apply_patch(&cached, &content.diff)?;
        self.cache.set(content.cache_key.clone(), body.clone());
        Ok(body)
    }
}
