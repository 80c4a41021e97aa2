//! Request ID propagation.
//!
//! Every request runs inside a `request` span carrying an id taken from
//! `x-request-id` or `x-correlation-id` when the caller supplies a usable one.
//! The id is echoed back in `x-request-id`.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Accepts caller-supplied ids of 1..=128 ASCII alphanumerics, `-` or `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_REQUEST_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(Arc::from(raw)))
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        [&REQUEST_ID_HEADER, &CORRELATION_ID_HEADER]
            .into_iter()
            .filter_map(|name| headers.get(name)?.to_str().ok())
            .find_map(Self::parse)
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_headers(request.headers());
    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_parse_accepts_safe_ids() {
        for id in ["abc123", "abc-123", "abc_123", "ABC-123_xyz"] {
            assert_eq!(RequestId::parse(id).unwrap().as_str(), id);
        }
        assert!(RequestId::parse(&"a".repeat(128)).is_some());
    }

    #[test]
    fn test_parse_rejects_unsafe_ids() {
        for id in ["", "abc 123", "abc@123", "abc/123", "ünicode"] {
            assert!(RequestId::parse(id).is_none(), "{id:?} should be rejected");
        }
        assert!(RequestId::parse(&"a".repeat(129)).is_none());
    }

    #[test]
    fn test_correlation_id_is_a_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(&CORRELATION_ID_HEADER, HeaderValue::from_static("corr-1"));
        assert_eq!(RequestId::from_headers(&headers).as_str(), "corr-1");

        headers.insert(&REQUEST_ID_HEADER, HeaderValue::from_static("bad id"));
        assert_eq!(RequestId::from_headers(&headers).as_str(), "corr-1");

        headers.insert(&REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));
        assert_eq!(RequestId::from_headers(&headers).as_str(), "req-1");
    }
}
