use std::time::Instant;

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderName, HeaderValue, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_LOGGED_BODY: usize = 4096;

/// Logs every request and dumps the body of server errors.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let span = info_span!("request", id = %request_id, %method, %path);
    let response = next.run(req).instrument(span.clone()).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(parent: &span, status = status.as_u16(), elapsed_ms, "request completed");

    // buffer the body so it can be logged and still handed to the client
    let mut response = if status.is_server_error() {
        let (mut parts, body) = response.into_parts();
        match to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
                error!(
                    parent: &span,
                    status = status.as_u16(),
                    body = %String::from_utf8_lossy(logged),
                    truncated = bytes.len() > MAX_LOGGED_BODY,
                    "server error"
                );
                Response::from_parts(parts, Body::from(bytes))
            }
            Err(e) => {
                error!(parent: &span, "failed to read error response body: {}", e);
                parts.headers.remove(CONTENT_LENGTH);
                Response::from_parts(parts, Body::empty())
            }
        }
    } else {
        response
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID.clone(), value);
    }
    response
}
