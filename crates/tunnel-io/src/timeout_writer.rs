//! A buffered writer that guarantees a flush 10 ms after the first
//! unflushed write, even if the caller stalls before writing again —
//! used to coalesce small writes for large, non-cacheable responses.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::TunnelIoError;
use crate::writer::TunnelWriter;

enum Command {
    Write(Bytes),
    Close,
}

/// A handle to a background flush actor. Cloning shares the same actor.
#[derive(Clone)]
pub struct TimeoutWriter {
    tx: mpsc::Sender<Command>,
}

impl TimeoutWriter {
    pub fn spawn(inner: TunnelWriter, flush_delay: Duration, flush_threshold: usize) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(run(inner, rx, flush_delay, flush_threshold));
        Self { tx }
    }

    pub async fn write(&self, payload: Bytes) -> Result<(), TunnelIoError> {
        self.tx
            .send(Command::Write(payload))
            .await
            .map_err(|_| TunnelIoError::ChannelClosed)
    }

    pub async fn close(&self) -> Result<(), TunnelIoError> {
        self.tx
            .send(Command::Close)
            .await
            .map_err(|_| TunnelIoError::ChannelClosed)
    }
}

async fn run(
    inner: TunnelWriter,
    mut rx: mpsc::Receiver<Command>,
    flush_delay: Duration,
    flush_threshold: usize,
) {
    let mut buffer = BytesMut::new();
    // Set when the buffer transitions from empty to non-empty; fixed at
    // that instant so a steady trickle of sub-`flush_delay` writes can't
    // keep pushing the deadline out.
    let mut deadline: Option<Instant> = None;
    loop {
        let pending_flush = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Write(bytes)) => {
                    if buffer.is_empty() {
                        deadline = Some(Instant::now() + flush_delay);
                    }
                    buffer.extend_from_slice(&bytes);
                    if buffer.len() >= flush_threshold {
                        let chunk = buffer.split().freeze();
                        deadline = None;
                        if inner.write(chunk).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Command::Close) => {
                    if !buffer.is_empty() {
                        let chunk = buffer.split().freeze();
                        let _ = inner.write(chunk).await;
                    }
                    let _ = inner.close().await;
                    return;
                }
                None => return,
            },
            _ = pending_flush => {
                let chunk = buffer.split().freeze();
                deadline = None;
                let _ = inner.write(chunk).await;
            }
        }
    }
}
