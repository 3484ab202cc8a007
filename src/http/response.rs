//! Response handling and transformation.
//!
//! # Responsibilities
//! - Copy the upstream status and reason phrase to the client
//! - Copy the fixed content-header subset, with fallbacks
//! - Force `Content-Disposition: inline`
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Only the mapped headers reach the client; everything else upstream
//!   sent (cookies, signatures, caching) is dropped
//! - Missing optional headers map to an empty value; an empty
//!   `Content-Length` is removed before the response reaches hyper, which
//!   then frames the body itself (chunked, or nothing for HEAD)

use axum::body::Body;
use axum::http::header::{
    HeaderName, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use hyper::ext::ReasonPhrase;

/// Upstream header → fallback when upstream omitted it.
const COPIED_HEADERS: [(HeaderName, &str); 4] = [
    (CONTENT_TYPE, "application/octet-stream"),
    (CONTENT_LENGTH, ""),
    (ACCEPT_RANGES, "bytes"),
    (CONTENT_RANGE, ""),
];

/// Build the outbound header set from the upstream response headers.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(COPIED_HEADERS.len() + 1);

    for (name, fallback) in COPIED_HEADERS {
        let value = upstream
            .get(&name)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(fallback));
        headers.insert(name, value);
    }
    headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));

    headers
}

/// Assemble the client response around an already-wrapped body stream.
pub fn relay_response(
    status: StatusCode,
    reason: Option<ReasonPhrase>,
    upstream_headers: &HeaderMap,
    body: Body,
) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = relay_headers(upstream_headers);
    if response
        .headers()
        .get(CONTENT_LENGTH)
        .is_some_and(|v| v.is_empty())
    {
        response.headers_mut().remove(CONTENT_LENGTH);
    }
    if let Some(reason) = reason {
        response.extensions_mut().insert(reason);
    }
    response
}
