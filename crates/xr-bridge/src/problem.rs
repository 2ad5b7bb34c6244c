//! RFC 9457 problem responses.
//!
//! Every error leaving the bridge is a problem document carrying the
//! taxonomy mapping from `xr_core::error`, the original request URL as
//! `instance`, and the request's trace ids.

use crate::trace::TraceContext;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use xr_core::error::FacadeError;

const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// An RFC 9457 problem document plus bridge tracing fields.
#[derive(Debug, Clone)]
pub struct Problem {
    pub status: u16,
    pub title: String,
    pub detail: String,
    pub instance: String,
    pub trace_id: String,
    pub correlation_id: String,
    /// Additional members merged into the body (e.g. `groupType` on
    /// upstream failures).
    pub extensions: Map<String, Value>,
}

impl Problem {
    pub fn new(
        status: u16,
        title: impl Into<String>,
        detail: impl Into<String>,
        instance: impl Into<String>,
        trace: &TraceContext,
    ) -> Self {
        Self {
            status,
            title: title.into(),
            detail: detail.into(),
            instance: instance.into(),
            trace_id: trace.trace_id.clone(),
            correlation_id: trace.correlation_id.clone(),
            extensions: Map::new(),
        }
    }

    pub fn from_error(err: &FacadeError, instance: &str, trace: &TraceContext) -> Self {
        Self::new(err.http_status(), err.title(), err.to_string(), instance, trace)
    }

    pub fn not_found(instance: &str, trace: &TraceContext) -> Self {
        Self::new(
            404,
            "Not Found",
            format!("no registry entity at {instance}"),
            instance,
            trace,
        )
    }

    pub fn method_not_allowed(method: &str, instance: &str, trace: &TraceContext) -> Self {
        Self::new(
            405,
            "Method Not Allowed",
            format!("the registry is read-only; {method} is not supported"),
            instance,
            trace,
        )
    }

    pub fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }

    fn body(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), json!("about:blank"));
        map.insert("title".into(), json!(self.title));
        map.insert("status".into(), json!(self.status));
        map.insert("detail".into(), json!(self.detail));
        map.insert("instance".into(), json!(self.instance));
        map.insert("traceId".into(), json!(self.trace_id));
        map.insert("correlationId".into(), json!(self.correlation_id));
        for (key, value) in &self.extensions {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        tracing::debug!(
            status = self.status,
            title = %self.title,
            instance = %self.instance,
            trace_id = %self.trace_id,
            "problem response"
        );

        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            self.body().to_string(),
        )
            .into_response()
    }
}
