//! Tee of a response body into the cache.
//!
//! The caller keeps reading the body as usual while every chunk is also handed
//! to a spawned writer task through a channel with room for one chunk, so the
//! writer can never fall more than one chunk behind and memory stays bounded.
//! The writer's outcome is only awaited once the caller reaches the end of the
//! body. Dropping the body early closes the channel without the end marker,
//! which the writer reports as an error and nothing is stored.

use super::Body;
use crate::cache::StreamCache;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

enum Chunk {
    Data(Bytes),
    End,
}

struct Tee {
    upstream: BoxStream<'static, Bytes>,
    tx: Option<mpsc::Sender<Chunk>>,
    writer: Option<JoinHandle<Result<()>>>,
    key: String,
    done: bool,
}

/// Returns a body yielding the same chunks as `upstream` while storing them
/// under `key`. A failure to store surfaces as the final item of the body.
pub(crate) fn tee_into_cache(upstream: Body, cache: Arc<dyn StreamCache>, key: String) -> Body {
    let (tx, rx) = mpsc::channel::<Chunk>(1);
    let writer_key = key.clone();
    let writer = tokio::spawn(async move {
        let result = cache
            .set_reader(&writer_key, received(rx, writer_key.clone()))
            .await;
        if let Err(e) = &result {
            debug!(key = %writer_key, error = %e, "response body not stored");
        }
        result
    });

    let tee = Tee {
        upstream: upstream.into_stream(),
        tx: Some(tx),
        writer: Some(writer),
        key,
        done: false,
    };
    Body::from_stream(futures::stream::unfold(tee, next_chunk))
}

async fn next_chunk(mut tee: Tee) -> Option<(Result<Bytes>, Tee)> {
    if tee.done {
        return None;
    }
    match tee.upstream.next().await {
        Some(Ok(chunk)) => {
            if let Some(tx) = &tee.tx {
                if tx.send(Chunk::Data(chunk.clone())).await.is_err() {
                    // writer is gone; keep serving the caller
                    tee.tx = None;
                }
            }
            Some((Ok(chunk), tee))
        }
        Some(Err(e)) => {
            // Dropping the sender without End makes the writer abandon the entry.
            tee.done = true;
            tee.tx = None;
            tee.writer = None;
            Some((Err(e), tee))
        }
        None => {
            tee.done = true;
            if let Some(tx) = tee.tx.take() {
                let _ = tx.send(Chunk::End).await;
            }
            let writer = tee.writer.take()?;
            let failure = match writer.await {
                Ok(Ok(())) => return None,
                Ok(Err(e)) => e.to_string(),
                Err(join) => join.to_string(),
            };
            let err = Error::runtime_with_context(
                "failed to store response body",
                ErrorContext::new()
                    .with_field_path(tee.key.clone())
                    .with_details(failure)
                    .with_source("caching_body"),
            );
            Some((Err(err), tee))
        }
    }
}

/// The writer's view of the channel. Closing without [`Chunk::End`] is an
/// error so that a truncated body is never stored.
fn received(rx: mpsc::Receiver<Chunk>, key: String) -> BoxStream<'static, Bytes> {
    Box::pin(futures::stream::unfold(Some(rx), move |rx| {
        let key = key.clone();
        async move {
            let mut rx = rx?;
            match rx.recv().await {
                Some(Chunk::Data(chunk)) => Some((Ok(chunk), Some(rx))),
                Some(Chunk::End) => None,
                None => Some((
                    Err(Error::runtime_with_context(
                        "response body closed before it was fully read",
                        ErrorContext::new()
                            .with_field_path(key)
                            .with_source("caching_body"),
                    )),
                    None,
                )),
            }
        }
    }))
}
