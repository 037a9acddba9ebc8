//! Stream reader/writer adapters bridging a single logical stream's
//! message channels to byte-stream semantics.

pub mod error;
pub mod reader;
pub mod timeout_writer;
pub mod writer;

pub use error::TunnelIoError;
pub use reader::{CachedTunnelReader, TunnelReader};
pub use timeout_writer::TimeoutWriter;
pub use writer::{CachedTunnelWriter, TunnelWriter};
