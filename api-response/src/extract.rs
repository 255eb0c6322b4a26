//! Extractors whose rejections are [`ApiError`]s.
//!
//! `ValidatedJson<T>` is a drop-in replacement for `Json<T>` that:
//! 1. rejects non-JSON content types with 415,
//! 2. parses the body, rejecting malformed JSON with 400,
//! 3. applies `T`'s per-field string modes (trim / markup rejection),
//! 4. deserializes into `T`, rejecting members `T` does not declare,
//! 5. runs `T`'s own validation.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::fields::{FieldModes, MarkupRejected, StringFields};
use crate::validation::{FieldError, Validatable};

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + StringFields + Validatable + Send + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let Json(mut body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::from_json_rejection(rejection, content_type.as_deref()))?;

        FieldModes::for_type::<T>()
            .apply(&mut body)
            .map_err(ApiError::Validation)?;

        let data: T = deserialize_strict(body)?;

        data.validate().map_err(ApiError::Validation)?;

        Ok(ValidatedJson(data))
    }
}

/// Typed deserialization that reports the failing field by path and refuses
/// members the target type does not declare.
fn deserialize_strict<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let mut unknown = Vec::new();
    let mut record_unknown = |path: serde_ignored::Path<'_>| unknown.push(path.to_string());
    let ignoring = serde_ignored::Deserializer::new(body, &mut record_unknown);

    let data: T = serde_path_to_error::deserialize(ignoring).map_err(|err| {
        let path = err.path().to_string();
        let reason = err.into_inner().to_string();
        if reason.starts_with(MarkupRejected::MESSAGE) {
            let field = if path == "." { ROOT_FIELD.to_string() } else { path };
            ApiError::Validation(vec![FieldError::new(field, MarkupRejected::MESSAGE)])
        } else {
            ApiError::MalformedBody {
                reason: format!("{path}: {reason}"),
            }
        }
    })?;

    if !unknown.is_empty() {
        return Err(ApiError::MalformedBody {
            reason: format!("unknown field(s): {}", unknown.join(", ")),
        });
    }

    Ok(data)
}

const ROOT_FIELD: &str = "body";

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::DerefMut for ValidatedJson<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Query string extractor rejecting with a problem detail.
///
/// Failures name the offending parameter: a missing one becomes a
/// missing-parameter 400, one that does not parse a type-mismatch 400.
pub struct Query<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let pairs = serde_urlencoded::Deserializer::new(form_urlencoded::parse(query.as_bytes()));

        serde_path_to_error::deserialize(pairs)
            .map(Query)
            .map_err(|err| ApiError::from_query_failure(err, query))
    }
}

/// `axum::extract::Path` rejecting with a problem detail.
pub struct Path<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) = axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Path(value))
    }
}
