//! Translation of request failures into RFC 9457 problem details.
//!
//! Every failure path ends in [`ApiError::into_response`]: it fetches the
//! request's trace id (or generates one), logs once at a level tied to the
//! status class, and renders a [`ProblemDetail`] body with content type
//! `application/problem+json`. Nothing is retried; the request is over.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trace::TraceId;
use crate::validation::{merge_field_errors, FieldError};

pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

const INTERNAL_DETAIL: &str = "Internal Server Error. Please contact technical support";
const PANIC_DETAIL: &str = "An unexpected internal failure occurred.";

lazy_static! {
    static ref MISSING_FIELD: Regex = Regex::new(r"missing field `([^`]+)`").unwrap();
    static ref SERDE_EXPECTED: Regex = Regex::new(r", expected (.+)$").unwrap();
}

/// RFC 9457 problem detail with `traceId` and `timestamp` extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub trace_id: TraceId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl ProblemDetail {
    pub fn new(status: StatusCode, detail: impl Into<String>, trace_id: TraceId) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            trace_id,
            timestamp: Utc::now(),
            errors: None,
        }
    }

    pub fn with_errors(mut self, errors: BTreeMap<String, String>) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl IntoResponse for ProblemDetail {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        response
    }
}

/// A domain failure that carries its own HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiException {
    status: StatusCode,
    message: String,
}

impl ApiException {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every way a request can fail, mapped to a fixed status and message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", INTERNAL_DETAIL)]
    Internal(#[from] anyhow::Error),

    #[error("Validation Failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid value '{value}' for parameter '{name}'. Expected type: {expected}.")]
    TypeMismatch {
        name: String,
        value: String,
        expected: String,
    },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Malformed JSON request. Please check your request body format.")]
    MalformedBody { reason: String },

    #[error("Required request parameter '{name}' is missing from the {location}.")]
    MissingParameter { name: String, location: &'static str },

    #[error("The requested resource '{path}' was not found.")]
    NotFound { path: String },

    #[error("Method '{method}' is not supported for this endpoint. Supported methods are: {}", SupportedMethods(.supported))]
    MethodNotAllowed { method: Method, supported: Vec<Method> },

    #[error("Content type '{content_type}' is not supported. Supported content types: application/json")]
    UnsupportedMediaType { content_type: String },

    #[error("{}", PANIC_DETAIL)]
    Panic { message: String },

    #[error(transparent)]
    Api(#[from] ApiException),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

struct SupportedMethods<'a>(&'a [Method]);

impl fmt::Display for SupportedMethods<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, method) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(method.as_str())?;
        }
        f.write_str("]")
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) | ApiError::Panic { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_)
            | ApiError::TypeMismatch { .. }
            | ApiError::InvalidParameter(_)
            | ApiError::MalformedBody { .. }
            | ApiError::MissingParameter { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Api(exception) => exception.status(),
        }
    }

    /// Build the problem detail for this error under `trace_id`.
    pub fn to_problem(&self, trace_id: TraceId) -> ProblemDetail {
        let problem = ProblemDetail::new(self.status(), self.to_string(), trace_id);
        match self {
            ApiError::Validation(errors) => problem.with_errors(merge_field_errors(errors)),
            _ => problem,
        }
    }

    pub fn from_json_rejection(rejection: JsonRejection, content_type: Option<&str>) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ApiError::UnsupportedMediaType {
                content_type: content_type.unwrap_or("none").to_string(),
            },
            JsonRejection::JsonDataError(err) => ApiError::MalformedBody {
                reason: err.body_text(),
            },
            JsonRejection::JsonSyntaxError(err) => ApiError::MalformedBody {
                reason: err.body_text(),
            },
            JsonRejection::BytesRejection(err) => ApiError::MalformedBody {
                reason: err.body_text(),
            },
            other => ApiError::MalformedBody {
                reason: other.body_text(),
            },
        }
    }

    /// Map a query string deserialization failure, `query` being the raw
    /// (still encoded) query string it was read from.
    pub fn from_query_failure<E: fmt::Display>(
        err: serde_path_to_error::Error<E>,
        query: &str,
    ) -> Self {
        let name = err.path().to_string();
        let reason = err.into_inner().to_string();

        if let Some(missing) = MISSING_FIELD.captures(&reason).and_then(|c| c.get(1)) {
            return ApiError::MissingParameter {
                name: missing.as_str().to_string(),
                location: "query string",
            };
        }

        let value = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.into_owned());

        match (value, expected_type(&reason)) {
            (Some(value), Some(expected)) => ApiError::TypeMismatch {
                name,
                value,
                expected,
            },
            _ => ApiError::InvalidParameter(format!("Invalid query string: {reason}")),
        }
    }

    fn log(&self, trace_id: TraceId, status: StatusCode) {
        let status = status.as_u16();
        match self {
            ApiError::Internal(err) => {
                let chain = format!("{err:#}");
                tracing::error!(%trace_id, status, error = %chain, "Unhandled error");
            }
            ApiError::Panic { message } => {
                tracing::error!(%trace_id, status, panic = %message, "Handler panicked");
            }
            ApiError::Validation(errors) => {
                tracing::warn!(%trace_id, status, errors = ?merge_field_errors(errors), "Validation error");
            }
            ApiError::TypeMismatch { .. } | ApiError::InvalidParameter(_) => {
                tracing::warn!(%trace_id, status, "Type mismatch error: {}", self);
            }
            ApiError::MalformedBody { reason } => {
                tracing::warn!(%trace_id, status, %reason, "Malformed JSON request");
            }
            ApiError::MissingParameter { .. } => {
                tracing::warn!(%trace_id, status, "Missing parameter: {}", self);
            }
            ApiError::NotFound { .. } => {
                tracing::warn!(%trace_id, status, "Not found: {}", self);
            }
            ApiError::MethodNotAllowed { .. } => {
                tracing::warn!(%trace_id, status, "Method not allowed: {}", self);
            }
            ApiError::UnsupportedMediaType { .. } => {
                tracing::warn!(%trace_id, status, "Unsupported media type: {}", self);
            }
            ApiError::Api(exception) if exception.status().is_server_error() => {
                tracing::error!(%trace_id, status, "Business logic exception: {exception}");
            }
            ApiError::Api(exception) => {
                tracing::warn!(%trace_id, status, "Business logic exception: {exception}");
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let trace_id = TraceId::current_or_generate();
        let status = self.status();
        self.log(trace_id, status);
        self.to_problem(trace_id).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::from_json_rejection(rejection, None)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        if let Some(name) = MISSING_FIELD.captures(&text).and_then(|c| c.get(1)) {
            return ApiError::MissingParameter {
                name: name.as_str().to_string(),
                location: "query string",
            };
        }
        ApiError::InvalidParameter(text)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => match err.into_kind() {
                ErrorKind::ParseErrorAtKey {
                    key,
                    value,
                    expected_type,
                } => ApiError::TypeMismatch {
                    name: key,
                    value,
                    expected: expected_type.to_string(),
                },
                ErrorKind::ParseErrorAtIndex {
                    index,
                    value,
                    expected_type,
                } => ApiError::TypeMismatch {
                    name: index.to_string(),
                    value,
                    expected: expected_type.to_string(),
                },
                ErrorKind::ParseError {
                    value,
                    expected_type,
                } => ApiError::TypeMismatch {
                    name: "path".to_string(),
                    value,
                    expected: expected_type.to_string(),
                },
                kind => ApiError::InvalidParameter(format!("Invalid path parameter: {kind}")),
            },
            PathRejection::MissingPathParams(err) => {
                ApiError::Internal(anyhow::anyhow!(err.body_text()))
            }
            other => ApiError::InvalidParameter(other.body_text()),
        }
    }
}

/// Name of the type a scalar parser or serde was looking for, recovered from
/// its error message.
fn expected_type(reason: &str) -> Option<String> {
    match reason {
        "invalid digit found in string"
        | "cannot parse integer from empty string"
        | "number too large to fit in target type"
        | "number too small to fit in target type" => Some("integer".to_string()),
        "invalid float literal" | "cannot parse float from empty string" => {
            Some("number".to_string())
        }
        "provided string was not `true` or `false`" => Some("boolean".to_string()),
        _ => SERDE_EXPECTED
            .captures(reason)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Fallback handler for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
    }
}

/// Replaces the router's bare 405 with a problem detail listing the allowed
/// methods.
pub async fn method_not_allowed(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;

    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let supported = response
        .headers()
        .get(header::ALLOW)
        .and_then(|v| v.to_str().ok())
        .map(|allow| {
            allow
                .split(',')
                .filter_map(|m| Method::from_bytes(m.trim().as_bytes()).ok())
                .collect()
        })
        .unwrap_or_default();

    let mut translated = ApiError::MethodNotAllowed { method, supported }.into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        translated.headers_mut().insert(header::ALLOW, allow.clone());
    }
    translated
}

/// Panic handler for `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Panic { message }.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn problem_of(response: Response) -> ProblemDetail {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_status_table() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::Internal(anyhow::anyhow!("db down")), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Validation(vec![]), StatusCode::BAD_REQUEST),
            (
                ApiError::TypeMismatch {
                    name: "id".into(),
                    value: "abc".into(),
                    expected: "u64".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::MalformedBody { reason: "eof".into() }, StatusCode::BAD_REQUEST),
            (
                ApiError::MissingParameter {
                    name: "q".into(),
                    location: "query string",
                },
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound { path: "/x".into() }, StatusCode::NOT_FOUND),
            (
                ApiError::MethodNotAllowed {
                    method: Method::DELETE,
                    supported: vec![Method::GET],
                },
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            (
                ApiError::UnsupportedMediaType {
                    content_type: "text/plain".into(),
                },
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (ApiError::Panic { message: "boom".into() }, StatusCode::INTERNAL_SERVER_ERROR),
            (ApiException::conflict("taken").into(), StatusCode::CONFLICT),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error:?}");
        }
    }

    #[test]
    fn test_messages() {
        let mismatch = ApiError::TypeMismatch {
            name: "id".into(),
            value: "abc".into(),
            expected: "u64".into(),
        };
        assert_eq!(
            mismatch.to_string(),
            "Invalid value 'abc' for parameter 'id'. Expected type: u64."
        );

        let not_allowed = ApiError::MethodNotAllowed {
            method: Method::DELETE,
            supported: vec![Method::GET, Method::POST],
        };
        assert_eq!(
            not_allowed.to_string(),
            "Method 'DELETE' is not supported for this endpoint. Supported methods are: [GET, POST]"
        );
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let internal = ApiError::Internal(anyhow::anyhow!("password=hunter2"));
        assert_eq!(internal.to_problem(TraceId::new()).detail, INTERNAL_DETAIL);

        let panic = ApiError::Panic {
            message: "called `Option::unwrap()` on a `None` value".into(),
        };
        assert_eq!(panic.to_problem(TraceId::new()).detail, PANIC_DETAIL);
    }

    #[test]
    fn test_validation_problem_merges_errors() {
        let error = ApiError::Validation(vec![
            FieldError::new("name", "is required"),
            FieldError::new("name", "must be at least 2 characters"),
        ]);
        let problem = error.to_problem(TraceId::new());

        assert_eq!(problem.detail, "Validation Failed");
        assert_eq!(problem.title, "Bad Request");
        let errors = problem.errors.unwrap();
        assert_eq!(errors["name"], "is required; must be at least 2 characters");
    }

    #[test]
    fn test_problem_wire_shape() {
        let trace_id = TraceId::new();
        let problem = ApiError::NotFound { path: "/nope".into() }.to_problem(trace_id);
        let value = serde_json::to_value(&problem).unwrap();

        assert_eq!(value["type"], "about:blank");
        assert_eq!(value["title"], "Not Found");
        assert_eq!(value["status"], 404);
        assert_eq!(value["detail"], "The requested resource '/nope' was not found.");
        assert_eq!(value["traceId"], trace_id.to_string());
        assert!(value["timestamp"].is_string());
        assert!(value.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_into_response_uses_current_trace_id() {
        let trace_id = TraceId::new();
        let response = trace_id
            .scope(async { ApiError::from(ApiException::forbidden("nope")).into_response() })
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            APPLICATION_PROBLEM_JSON
        );
        let problem = problem_of(response).await;
        assert_eq!(problem.trace_id, trace_id);
        assert_eq!(problem.detail, "nope");
    }

    #[tokio::test]
    async fn test_panic_handler_hides_payload() {
        let response = handle_panic(Box::new("secret state"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let problem = problem_of(response).await;
        assert!(!problem.detail.contains("secret"));
    }
}
