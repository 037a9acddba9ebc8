//! The generic `streamId -> Worker` dispatcher. A single dispatcher
//! instance is reused for HTTP routing and again for TCP routing, each
//! parameterized with a different worker factory.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tunnel_protocol::{Msg, StreamId};

use crate::error::WorkerError;

/// Handles a dispatcher's own worker may need: the shared outbound
/// channel, and a way to report back that it has finished so its stream
/// id can be released.
#[derive(Clone)]
pub struct WorkerHandles {
    pub outbound: mpsc::Sender<Msg>,
    done: mpsc::Sender<DispatcherEvent>,
}

impl WorkerHandles {
    pub async fn report_done(&self, stream_id: StreamId) {
        let _ = self.done.send(DispatcherEvent::Done(stream_id)).await;
    }

    /// Builds a standalone handle for tests that exercise a single worker
    /// without a live dispatcher backing it.
    #[cfg(test)]
    pub fn for_test(outbound: mpsc::Sender<Msg>) -> Self {
        let (done, _rx) = mpsc::channel(1);
        Self { outbound, done }
    }
}

enum DispatcherEvent {
    Frame(Msg),
    Done(StreamId),
}

pub type WorkerFactory =
    Arc<dyn Fn(StreamId, Msg, WorkerHandles) -> mpsc::Sender<Msg> + Send + Sync>;

/// A handle to a running dispatcher task. Cheap to clone.
#[derive(Clone)]
pub struct StreamDispatcher {
    tx: mpsc::Sender<DispatcherEvent>,
}

impl StreamDispatcher {
    pub fn spawn(outbound: mpsc::Sender<Msg>, factory: WorkerFactory) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let handles = WorkerHandles {
            outbound,
            done: tx.clone(),
        };
        tokio::spawn(run(rx, handles, factory));
        Self { tx }
    }

    pub async fn dispatch(&self, msg: Msg) -> Result<(), WorkerError> {
        self.tx
            .send(DispatcherEvent::Frame(msg))
            .await
            .map_err(|_| WorkerError::DispatcherClosed)
    }
}

async fn run(mut rx: mpsc::Receiver<DispatcherEvent>, handles: WorkerHandles, factory: WorkerFactory) {
    let mut streams: HashMap<StreamId, mpsc::Sender<Msg>> = HashMap::new();
    while let Some(event) = rx.recv().await {
        match event {
            DispatcherEvent::Frame(msg) => {
                let stream_id = msg.header.stream_id;
                if let Some(worker_tx) = streams.get(&stream_id) {
                    if worker_tx.send(msg).await.is_err() {
                        streams.remove(&stream_id);
                    }
                } else {
                    let worker_tx = factory(stream_id, msg, handles.clone());
                    streams.insert(stream_id, worker_tx);
                }
            }
            DispatcherEvent::Done(stream_id) => {
                streams.remove(&stream_id);
            }
        }
    }
}
