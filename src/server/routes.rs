use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::handler::{Handler, HandlerWithoutStateExt};
use axum::middleware;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::rate_limit;
use super::state::AppState;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    // Only POSTs to the translation endpoints count against the rate limit;
    // the 405 fallbacks sit outside it.
    let limit = middleware::from_fn_with_state(state.clone(), rate_limit::enforce);

    let router = Router::new()
        .route(
            "/api/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/translate",
            post(handlers::translate.layer(limit.clone()))
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/retranslate",
            post(handlers::retranslate.layer(limit)).fallback(handlers::method_not_allowed),
        );

    let router = match &state.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(handlers::not_found.into_service()),
        ),
        None => router.fallback(handlers::not_found),
    };

    router
        .layer(DefaultBodyLimit::max(handlers::MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
