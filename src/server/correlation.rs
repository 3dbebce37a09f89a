use std::fmt;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Lightweight correlation ID helper based on UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self { Self(Uuid::new_v4().to_string()) }

    /// Reuse an upstream id when it is a non-empty, header-safe token; otherwise generate one.
    pub fn from_opt_str(s: Option<&str>) -> Self {
        if let Some(v) = s.map(str::trim) {
            if let Ok(u) = Uuid::parse_str(v) {
                return Self(u.to_string());
            }
            if !v.is_empty() && v.len() <= 128 && v.chars().all(|c| c.is_ascii_graphic()) {
                return Self(v.to_string());
            }
        }
        Self::new()
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for CorrelationId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Middleware: run each request inside a `request` span carrying its correlation id,
/// and echo the id back in `x-request-id`.
pub async fn correlate(req: Request, next: Next) -> Response {
    let id = CorrelationId::from_opt_str(req.headers().get(&REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()));
    let span = tracing::info_span!(
        "request",
        id = %id,
        method = %req.method(),
        route = %req.uri().path(),
    );
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(v) = HeaderValue::from_str(id.as_str()) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    resp
}
