//! Per-request trace identifiers.
//!
//! [`trace_id_middleware`] assigns a fresh [`TraceId`] to every request and
//! makes it reachable three ways while the request is in flight: as a request
//! extension (and therefore an extractor), through [`TraceId::current`], and
//! as the `trace_id` field of the request's `tracing` span. The request-local
//! slot is a tokio task-local whose scope ends with the inner future, so an
//! id can never be observed by a later request on the same worker thread.

use std::fmt;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

/// Default header name used to echo the trace id back to clients.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

tokio::task_local! {
    static CURRENT_TRACE_ID: TraceId;
}

/// Correlation id for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate a new random trace id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The trace id of the request being handled on this task, if any.
    pub fn current() -> Option<Self> {
        CURRENT_TRACE_ID.try_with(|id| *id).ok()
    }

    /// The current trace id, or a fresh one when called outside a traced
    /// request (e.g. a router without the middleware).
    pub fn current_or_generate() -> Self {
        Self::current().unwrap_or_default()
    }

    /// Run `fut` with `self` as the request-local trace id.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        CURRENT_TRACE_ID.scope(self, fut).await
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for TraceId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TraceId>()
            .copied()
            .unwrap_or_else(TraceId::current_or_generate))
    }
}

/// Settings for [`trace_id_middleware`].
#[derive(Clone, Debug, Default)]
pub struct TraceSettings {
    pub response_header: Option<HeaderName>,
}

pub async fn trace_id_middleware(
    State(settings): State<Arc<TraceSettings>>,
    mut request: Request,
    next: Next,
) -> Response {
    let trace_id = TraceId::new();
    request.extensions_mut().insert(trace_id);

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = trace_id
        .scope(next.run(request))
        .instrument(span)
        .await;

    if let Some(header) = &settings.response_header {
        if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
            response.headers_mut().insert(header.clone(), value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_ids_are_unique() {
        let a = TraceId::new();
        let b = TraceId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = TraceId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[tokio::test]
    async fn test_current_is_scoped() {
        assert!(TraceId::current().is_none());

        let id = TraceId::new();
        let seen = id.scope(async { TraceId::current() }).await;
        assert_eq!(seen, Some(id));

        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn test_scope_is_cleared_after_panic() {
        let id = TraceId::new();
        let result = tokio::spawn(id.scope(async move {
            assert_eq!(TraceId::current(), Some(id));
            panic!("boom");
        }))
        .await;

        assert!(result.is_err());
        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn test_current_or_generate_outside_scope() {
        let a = TraceId::current_or_generate();
        let b = TraceId::current_or_generate();
        assert_ne!(a, b);
    }
}
