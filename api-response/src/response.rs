use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Immutable success envelope.
///
/// Serializes as `{"status", "message", "content", "timestamp"}`; `content`
/// is omitted when there is none. The timestamp is taken when the envelope
/// is built and cannot be supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<T>,
    timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn builder(status: StatusCode) -> ApiResponseBuilder<T> {
        ApiResponseBuilder {
            status,
            message: String::new(),
            content: None,
        }
    }

    /// 200 OK carrying `content`.
    pub fn success_with(message: impl Into<String>, content: T) -> Self {
        Self::status_with(message, content, StatusCode::OK)
    }

    /// 201 Created carrying `content`.
    pub fn created(message: impl Into<String>, content: T) -> Self {
        Self::status_with(message, content, StatusCode::CREATED)
    }

    pub fn status_with(message: impl Into<String>, content: T, status: StatusCode) -> Self {
        Self::builder(status).message(message).content(content).build()
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn content(&self) -> Option<&T> {
        self.content.as_ref()
    }

    pub fn into_content(self) -> Option<T> {
        self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl ApiResponse<()> {
    /// 200 OK without content.
    pub fn success(message: impl Into<String>) -> Self {
        Self::status(message, StatusCode::OK)
    }

    /// Any status, without content.
    pub fn status(message: impl Into<String>, status: StatusCode) -> Self {
        Self::builder(status).message(message).build()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

pub struct ApiResponseBuilder<T> {
    status: StatusCode,
    message: String,
    content: Option<T>,
}

impl<T> ApiResponseBuilder<T> {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn content(mut self, content: T) -> Self {
        self.content = Some(content);
        self
    }

    pub fn build(self) -> ApiResponse<T> {
        ApiResponse {
            status: self.status.as_u16(),
            message: self.message,
            content: self.content,
            timestamp: Utc::now(),
        }
    }
}
