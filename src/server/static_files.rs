//! Read-only file serving under the root, used by the UI for previews and direct downloads.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::error;

use super::AppState;
use crate::error::{AppError, AppResult};

const READ_CHUNK: usize = 64 * 1024;

fn file_not_found() -> AppError {
    AppError::not_found("not_found", "File not found")
}

pub(crate) async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let resolved = state.resolve(Some(&path))?;
    // Dotfiles are not served, same as they are not listed.
    if resolved.is_root() || resolved.segments().any(|s| s.starts_with('.')) {
        return Err(file_not_found());
    }

    let meta = match tokio::fs::metadata(resolved.as_path()).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(file_not_found()),
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => {
            return Err(file_not_found());
        }
        Err(e) => {
            error!(path = resolved.relative(), error = %e, "stat failed");
            return Err(AppError::internal("internal", "Internal server error"));
        }
    };

    let file = File::open(resolved.as_path()).await.map_err(|e| {
        error!(path = resolved.relative(), error = %e, "open failed");
        AppError::internal("internal", "Internal server error")
    })?;

    let body = stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    });

    let mime = mime_guess::from_path(resolved.as_path()).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(meta.len())),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
