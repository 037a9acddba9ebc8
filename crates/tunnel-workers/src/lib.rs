//! Per-stream worker state machines and the dispatcher that routes inbound
//! frames to them by stream id.

pub mod cache_worker;
pub mod dispatcher;
pub mod error;
pub mod http_worker;
pub mod tcp_worker;

pub use dispatcher::{StreamDispatcher, WorkerFactory, WorkerHandles};
pub use error::WorkerError;
pub use http_worker::HttpWorkerContext;
