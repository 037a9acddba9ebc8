//! Server-side per-stream state machine for cacheable `GET`/`HEAD`
//! traffic: parse the tunneled HTTP request, round-trip it to the origin,
//! and stream the response back — diffed against the peer's cache when
//! it's cheap enough to buffer.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tunnel_cache::{Cache, CacheCompressor, CacheManager};
use tunnel_http_wire::{content_length, parse_request_head, serialize_response_head, HeaderField};
use tunnel_io::{CachedTunnelWriter, TimeoutWriter, TunnelReader, TunnelWriter};
use tunnel_protocol::{flags, Msg, StreamId};

use crate::dispatcher::WorkerHandles;
use crate::error::WorkerError;

/// The 5 MiB cutoff past which a response is streamed raw instead of
/// buffered for compression.
const MAX_CACHE_SIZE: usize = 5 * 1024 * 1024;
const TIMEOUT_WRITER_THRESHOLD: usize = 500 * 1024;
const TIMEOUT_WRITER_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct HttpWorkerContext {
    pub client: reqwest::Client,
    pub cache: Cache,
    pub cache_manager: CacheManager,
    pub peer_id: String,
}

pub fn spawn(
    stream_id: StreamId,
    first_frame: Msg,
    handles: WorkerHandles,
    ctx: HttpWorkerContext,
) -> mpsc::Sender<Msg> {
    let (tx, rx) = mpsc::channel(10);
    tokio::spawn(async move {
        if let Err(err) = run(stream_id, first_frame, rx, &handles, &ctx).await {
            warn!(%stream_id, error = %err, "http worker failed");
        }
        handles.report_done(stream_id).await;
    });
    tx
}

async fn run(
    stream_id: StreamId,
    first_frame: Msg,
    rx: mpsc::Receiver<Msg>,
    handles: &WorkerHandles,
    ctx: &HttpWorkerContext,
) -> Result<(), WorkerError> {
    let writer = TunnelWriter::new(handles.outbound.clone(), stream_id, flags::HTTP | flags::TCP);
    let mut reader = TunnelReader::with_first_frame(rx, ctx.cache.clone(), first_frame)?;

    let (method, path, headers, body) = match read_request(&mut reader).await {
        Ok(parsed) => parsed,
        Err(err) => {
            writer.fail(err.to_string()).await?;
            return Err(err);
        }
    };

    let url = match reqwest::Url::parse(&path) {
        Ok(url) => url,
        Err(err) => {
            let message = format!("invalid request target {path}: {err}");
            writer.fail(message.clone()).await?;
            return Err(WorkerError::OriginFetch(message));
        }
    };

    info!(%stream_id, %method, %url, "http worker round trip");

    let response = match build_request(ctx, &method, url, &headers, body).send().await {
        Ok(response) => response,
        Err(err) => {
            writer.fail(err.to_string()).await?;
            return Err(WorkerError::OriginFetch(err.to_string()));
        }
    };

    let status = response.status();
    let reqwest_headers = response.headers().clone();
    let content_length = response.content_length();
    let response_headers: Vec<HeaderField> = reqwest_headers
        .iter()
        .map(|(name, value)| HeaderField {
            name: name.to_string(),
            value: value.to_str().unwrap_or_default().to_string(),
        })
        .collect();
    let head_bytes = serialize_response_head(
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        &response_headers,
    );

    let cacheable = content_length
        .map(|len| (len as usize) < MAX_CACHE_SIZE)
        .unwrap_or(false);

    if cacheable {
        let body = response
            .bytes()
            .await
            .map_err(|err| WorkerError::OriginFetch(err.to_string()))?;

        let mut full = BytesMut::with_capacity(head_bytes.len() + body.len());
        full.extend_from_slice(&head_bytes);
        full.extend_from_slice(&body);

        let cache_key = path.clone().into_bytes();
        let peer_digest = ctx
            .cache_manager
            .get_peer_digest(&ctx.peer_id, &cache_key)
            .unwrap_or_default();
        let compressor = CacheCompressor::new(ctx.cache.clone(), cache_key, peer_digest, true);
        let mut cached_writer = CachedTunnelWriter::new(writer, compressor);
        cached_writer.write(full.freeze()).await?;
        cached_writer.close().await?;
    } else {
        let timeout_writer = TimeoutWriter::spawn(writer, TIMEOUT_WRITER_DELAY, TIMEOUT_WRITER_THRESHOLD);
        timeout_writer.write(Bytes::from(head_bytes)).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| WorkerError::OriginFetch(err.to_string()))?;
            timeout_writer.write(chunk).await?;
        }
        timeout_writer.close().await?;
    }

    Ok(())
}

async fn read_request(
    reader: &mut TunnelReader,
) -> Result<(String, String, Vec<HeaderField>, Vec<u8>), WorkerError> {
    let mut buf = BytesMut::new();
    let (head, consumed) = loop {
        if let Some((head, consumed)) = parse_request_head(&buf)? {
            break (head, consumed);
        }
        match reader.read_chunk(64 * 1024).await? {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => return Err(WorkerError::OriginFetch("connection closed mid-request".to_string())),
        }
    };

    let mut body = buf.split_off(consumed).to_vec();
    if let Some(expected) = content_length(&head.headers) {
        while body.len() < expected {
            match reader.read_chunk(expected - body.len()).await? {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }
    }

    Ok((head.method, head.path, head.headers, body))
}

fn build_request(
    ctx: &HttpWorkerContext,
    method: &str,
    url: reqwest::Url,
    headers: &[HeaderField],
    body: Vec<u8>,
) -> reqwest::RequestBuilder {
    let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::GET);
    let mut builder = ctx.client.request(method, url);
    for header in headers {
        if header.name.eq_ignore_ascii_case("host") || header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        builder = builder.header(&header.name, &header.value);
    }
    if !body.is_empty() {
        builder = builder.body(body);
    }
    builder
}
