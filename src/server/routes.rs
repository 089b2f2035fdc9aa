//! Application routing

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{admin, health, status};
use crate::middleware::{
    auth::{require_admin_key, AuthState},
    logging::{log_request, REQUEST_ID_HEADER, TRACE_ID_HEADER},
};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Health checks and observability (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/liveness", get(health::liveness))
        .route("/status", get(status::status_report))
        .route("/metrics", get(status::metrics));

    let auth_state = AuthState::new(state.settings.clone());

    let admin_routes = Router::new()
        .route("/errors/reset", post(admin::reset_errors))
        .route("/cooldowns/reset", post(admin::reset_cooldowns))
        .route("/health/sweep", post(admin::sweep))
        .route("/credentials/offline", post(admin::set_offline))
        .route("/credentials/online", post(admin::set_online))
        .layer(middleware::from_fn_with_state(auth_state, require_admin_key));

    Router::new()
        .nest("/admin", admin_routes)
        .merge(public_routes)
        // First added = innermost; the logger wraps CORS
        .layer(create_cors_layer())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Create CORS layer with permissive settings
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}
