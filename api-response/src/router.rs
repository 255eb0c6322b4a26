use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::ApiResponseConfig;
use crate::error::{handle_panic, method_not_allowed, not_found};
use crate::trace::{trace_id_middleware, TraceSettings};

/// Installs the api-response layers on a finished router.
pub trait ApiResponseRouterExt {
    /// Call this last, after `with_state`. The router becomes the fallback
    /// service of an outer router so that the layers see each response as
    /// the client will, `Allow` header included. Layers, outermost first:
    /// 1. trace id assignment (always),
    /// 2. panic translation (if enabled and `catch_panics`),
    /// 3. 405 translation (if enabled),
    ///
    /// plus a 404 fallback on the inner router (if enabled).
    fn with_api_response(self, config: &ApiResponseConfig) -> Self;
}

impl ApiResponseRouterExt for Router {
    fn with_api_response(self, config: &ApiResponseConfig) -> Self {
        let inner = if config.enabled {
            self.fallback(not_found)
        } else {
            self
        };

        let mut router = Router::new().fallback_service(inner);

        if config.enabled {
            router = router.layer(middleware::from_fn(method_not_allowed));

            if config.catch_panics {
                router = router.layer(CatchPanicLayer::custom(handle_panic));
            }
        }

        let settings = Arc::new(TraceSettings {
            response_header: config.trace_header.clone(),
        });

        router.layer(middleware::from_fn_with_state(settings, trace_id_middleware))
    }
}
