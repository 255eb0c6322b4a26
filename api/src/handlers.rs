use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use api_response::{ApiException, ApiResponse, ApiResult, Path, Query, TraceId, ValidatedJson};
use axum::extract::State;
use serde_json::{json, Value};

use crate::{
    models::{Comment, CreateCommentRequest, CreateUserRequest, User, UserSearchParams},
    state::AppState,
};

const DEFAULT_SEARCH_LIMIT: usize = 20;

static NEXT_USER_ID: AtomicU64 = AtomicU64::new(1);

pub async fn health_check(State(state): State<AppState>) -> ApiResponse<Value> {
    let uptime = state.started_at.elapsed().as_secs();
    tracing::info!(uptime_secs = uptime, "health check passed");

    ApiResponse::success_with(
        "Service is healthy",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": uptime
        }),
    )
}

pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    let mut users = state
        .users
        .write()
        .map_err(|_| anyhow!("user store lock poisoned"))?;

    if users.values().any(|u| u.email.eq_ignore_ascii_case(&req.email)) {
        return Err(ApiException::conflict(format!("A user with email '{}' already exists", req.email)).into());
    }

    let user = User {
        id: NEXT_USER_ID.fetch_add(1, Ordering::Relaxed),
        name: req.name,
        email: req.email,
        bio: req.bio,
    };
    users.insert(user.id, user.clone());

    tracing::info!(user_id = user.id, "user created");
    Ok(ApiResponse::created("User created successfully", user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ApiResponse<User>> {
    let users = state
        .users
        .read()
        .map_err(|_| anyhow!("user store lock poisoned"))?;

    let user = users
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiException::not_found(format!("User {id} not found")))?;

    Ok(ApiResponse::success_with("User retrieved successfully", user))
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<UserSearchParams>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    let users = state
        .users
        .read()
        .map_err(|_| anyhow!("user store lock poisoned"))?;

    let needle = params.name.to_lowercase();
    let mut matches: Vec<User> = users
        .values()
        .filter(|u| u.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matches.sort_by_key(|u| u.id);
    matches.truncate(params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));

    Ok(ApiResponse::success_with(
        format!("Found {} user(s)", matches.len()),
        matches,
    ))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ApiResponse<()>> {
    let mut users = state
        .users
        .write()
        .map_err(|_| anyhow!("user store lock poisoned"))?;

    users
        .remove(&id)
        .ok_or_else(|| ApiException::not_found(format!("User {id} not found")))?;

    Ok(ApiResponse::success("User deleted successfully"))
}

pub async fn create_comment(
    trace_id: TraceId,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> ApiResponse<Comment> {
    tracing::info!(%trace_id, author = %req.author, "comment accepted");

    ApiResponse::created(
        "Comment created",
        Comment {
            author: req.author,
            content: req.content,
            signature: req.signature,
        },
    )
}

/// Deliberately panics; mounted only when `DEMO_PANIC_ROUTE=true`.
pub async fn boom() -> ApiResponse<()> {
    let cached: Option<&str> = None;
    ApiResponse::success(cached.expect("cache should be warm"))
}
