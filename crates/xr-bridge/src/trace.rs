use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Distributed-tracing metadata for one request.
///
/// Inbound `X-Trace-Id`/`X-Request-Id` and `X-Correlation-Id` headers
/// are adopted; missing ones are minted. Both ids ride along on every
/// log line, upstream call and problem response, and are echoed back
/// as response headers.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub correlation_id: String,
}

impl TraceContext {
    pub fn mint() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        Self {
            trace_id: header("x-trace-id")
                .or_else(|| header("x-request-id"))
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            correlation_id: header("x-correlation-id")
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Request middleware: attaches the trace context, times the request
/// and emits one structured log line per response.
pub async fn trace_middleware(mut request: Request, next: Next) -> Response {
    let trace = TraceContext::from_headers(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    request.extensions_mut().insert(trace.clone());
    let started = Instant::now();
    let mut response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_millis();
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms,
        trace_id = %trace.trace_id,
        correlation_id = %trace.correlation_id,
        "request"
    );

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&trace.trace_id) {
        headers.insert("x-trace-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(&trace.correlation_id) {
        headers.insert("x-correlation-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adopts_inbound_ids() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", HeaderValue::from_static("trace-1"));
        headers.insert("x-correlation-id", HeaderValue::from_static("corr-1"));

        let trace = TraceContext::from_headers(&headers);
        assert_eq!(trace.trace_id, "trace-1");
        assert_eq!(trace.correlation_id, "corr-1");
    }

    #[test]
    fn test_request_id_is_trace_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-9"));

        let trace = TraceContext::from_headers(&headers);
        assert_eq!(trace.trace_id, "req-9");
    }

    #[test]
    fn test_mints_when_absent() {
        let trace = TraceContext::from_headers(&HeaderMap::new());
        assert!(!trace.trace_id.is_empty());
        assert!(!trace.correlation_id.is_empty());
        assert_ne!(trace.trace_id, trace.correlation_id);
    }
}
