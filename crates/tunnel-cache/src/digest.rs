//! 16-byte MD5 content fingerprints, used as the cache's digest.

use md5::{Digest, Md5};

pub const DIGEST_LEN: usize = 16;

pub fn digest(body: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(body);
    hasher.finalize().to_vec()
}
