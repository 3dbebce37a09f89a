//! Streaming glue between the blocking archive writer and an HTTP response body.
//!
//! The archive is produced on a blocking thread and handed to the body in
//! chunks over a bounded channel. The handler waits for the first chunk before
//! sending headers: a failure before that point still gets a JSON error, a
//! failure after it aborts the connection.

use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, Span};

use crate::error::AppError;
use crate::explorer::{self, ArchiveError, ArchiveOptions, ResolvedPath};

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_DEPTH: usize = 8;

type Chunk = Result<Bytes, ArchiveError>;

/// `Write` adapter that forwards fixed-size chunks to the response body.
/// Fails with `BrokenPipe` once the receiving side is gone.
pub(crate) struct ChunkWriter {
    tx: mpsc::Sender<Chunk>,
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub(crate) fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self { tx, buf: Vec::with_capacity(CHUNK_SIZE) }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE)));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "download receiver dropped"))
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic"
    }
}

/// Run the archive writer on a blocking thread; returns the receiving end of its chunks.
fn spawn_archive(resolved: ResolvedPath, options: ArchiveOptions) -> mpsc::Receiver<Chunk> {
    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_DEPTH);
    let span = Span::current();
    tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let writer = ChunkWriter::new(tx.clone());
        let outcome = catch_unwind(AssertUnwindSafe(|| explorer::stream(&resolved, writer, &options)));
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) if e.is_sink_closed() => {
                debug!(path = resolved.relative(), "client went away; archive walk stopped");
                return;
            }
            Ok(Err(e)) => e,
            Err(payload) => {
                error!(target: "panic", "archive writer panic: {}", panic_message(payload.as_ref()));
                ArchiveError::Io(io::Error::other("archive writer panicked"))
            }
        };
        // Receiver may already be gone; nothing more to do then.
        let _ = tx.blocking_send(Err(err));
    });
    rx
}

pub(crate) fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    let value = if fallback == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(filename)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Build the download response for `resolved`, or a structured error if the
/// archive fails before its first chunk is ready.
pub(crate) async fn archive_response(
    resolved: ResolvedPath,
    filename: String,
    options: ArchiveOptions,
) -> Result<Response, AppError> {
    let rel = resolved.relative().to_string();
    let rx = spawn_archive(resolved, options);
    response_from_chunks(rx, rel, &filename).await
}

/// Wait for the first chunk, then hand the rest of `rx` to the body.
/// Errors after the headers are sent surface as body errors, never as JSON.
async fn response_from_chunks(
    mut rx: mpsc::Receiver<Chunk>,
    rel: String,
    filename: &str,
) -> Result<Response, AppError> {
    let first = match rx.recv().await {
        Some(Ok(chunk)) => chunk,
        Some(Err(e)) => {
            if !matches!(e, ArchiveError::NotFound | ArchiveError::NotADirectory) {
                error!(path = %rel, error = %e, "archive failed before streaming");
            }
            return Err(AppError::from(e));
        }
        None => {
            error!(path = %rel, "archive writer ended without output");
            return Err(AppError::internal("archive_failed", "Failed to create archive"));
        }
    };

    let rest = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
    let body = stream::once(async move { Ok(first) }).chain(rest).map(move |item| {
        item.map_err(|e| {
            // Headers are out; the only signal left is to cut the connection.
            error!(path = %rel, error = %e, "archive failed mid-stream; aborting response");
            io::Error::other(e)
        })
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
