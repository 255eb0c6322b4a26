use api_response::{ApiResponseConfig, ApiResponseRouterExt};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(handlers::health_check))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(handlers::create_user))
        .route("/api/users/search", get(handlers::search_users))
        .route(
            "/api/users/:id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
}

pub fn comment_routes() -> Router<AppState> {
    Router::new().route("/api/comments", post(handlers::create_comment))
}

/// Build the full application router.
pub fn app(state: AppState, config: &ApiResponseConfig) -> Router {
    let mut router = Router::new()
        .merge(health_routes())
        .merge(user_routes())
        .merge(comment_routes());

    if state.panic_route_enabled {
        router = router.route("/api/boom", get(handlers::boom));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .with_api_response(config)
}
