//! `DiffContent`: the self-describing record carried by a `TCP_DATA` frame
//! whose `contentType` is `CACHE_DIFF`.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiffContentWire {
    #[serde(rename = "CacheKey")]
    cache_key: ByteBuf,
    #[serde(rename = "PatchTo")]
    patch_to: ByteBuf,
    #[serde(rename = "Diff")]
    diff: ByteBuf,
}

/// `{ cacheKey, patchTo, diff }`. An empty `patch_to` means `diff` is the
/// full body — there was no baseline to diff against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffContent {
    pub cache_key: Vec<u8>,
    pub patch_to: Vec<u8>,
    pub diff: Vec<u8>,
}

impl DiffContent {
    pub fn full_body(cache_key: Vec<u8>, body: Vec<u8>) -> Self {
        Self {
            cache_key,
            patch_to: Vec::new(),
            diff: body,
        }
    }

    pub fn has_baseline(&self) -> bool {
        !self.patch_to.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let wire = DiffContentWire {
            cache_key: ByteBuf::from(self.cache_key.clone()),
            patch_to: ByteBuf::from(self.patch_to.clone()),
            diff: ByteBuf::from(self.diff.clone()),
        };
        Ok(rmp_serde::to_vec_named(&wire)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let wire: DiffContentWire = rmp_serde::from_slice(data)?;
        Ok(Self {
            cache_key: wire.cache_key.into_vec(),
            patch_to: wire.patch_to.into_vec(),
            diff: wire.diff.into_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_content_round_trips() {
        let dc = DiffContent {
            cache_key: b"http://example.com/a".to_vec(),
            patch_to: vec![1, 2, 3, 4],
            diff: b"patch-bytes".to_vec(),
        };
        let encoded = dc.encode().unwrap();
        let decoded = DiffContent::decode(&encoded).unwrap();
        assert_eq!(dc, decoded);
    }

    #[test]
    fn full_body_has_no_baseline() {
        let dc = DiffContent::full_body(b"k".to_vec(), b"body".to_vec());
        assert!(!dc.has_baseline());
    }
}
