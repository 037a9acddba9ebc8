//! The delta cache: local content-addressed storage, MD5 digesting, the
//! bsdiff-backed compressor/decompressor pair, and the server-side peer
//! digest mirror.

pub mod cache;
pub mod compressor;
pub mod delta;
pub mod digest;
pub mod error;
pub mod peer;

pub use cache::Cache;
pub use compressor::{CacheCompressor, CacheDecompressor};
pub use delta::{apply_patch, make_diff};
pub use digest::digest;
pub use error::CacheError;
pub use peer::{CacheManager, PeerCache};
