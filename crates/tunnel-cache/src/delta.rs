//! The `makeDiff`/`applyPatch` binary delta black box, backed by `bsdiff`.

use std::io::Cursor;

use crate::error::CacheError;

pub fn make_diff(old: &[u8], new: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut patch = Vec::new();
    bsdiff::diff(old, new, &mut patch)?;
    Ok(patch)
}

pub fn apply_patch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::new();
    bsdiff::patch(old, &mut Cursor::new(patch), &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_reconstructs_new_from_old() {
        let old = b"the quick brown fox jumps over the lazy dog".to_vec();
        let new = b"the quick brown fox leaps over the lazy dog today".to_vec();
        let patch = make_diff(&old, &new).unwrap();
        let reconstructed = apply_patch(&old, &patch).unwrap();
        assert_eq!(reconstructed, new);
    }

    #[test]
    fn identical_inputs_patch_to_themselves() {
        let body = b"unchanged body".to_vec();
        let patch = make_diff(&body, &body).unwrap();
        assert_eq!(apply_patch(&body, &patch).unwrap(), body);
    }
}
