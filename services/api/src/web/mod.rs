pub mod auth;
pub mod door;
pub mod hub;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod token;
pub mod ws_handler;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use ws_handler::ws_handler;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use doorlock_core::domain::NewLogEntry;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use state::AppState;

/// Appends an audit entry. A failed write is logged and otherwise ignored.
pub(crate) async fn record(state: &AppState, entry: NewLogEntry) {
    let kind = entry.kind;
    if let Err(e) = state.logs.append(entry).await {
        warn!(%kind, "Failed to write activity log entry: {}", e);
    }
}

/// Builds the full API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/door/verify-passcode", post(door::verify_passcode_handler))
        .route("/door/surname", get(door::surname_handler))
        .route("/doorbell/trigger", post(door::doorbell_handler));

    // Protected routes (session cookie required)
    let protected_routes = Router::new()
        .route("/door/lock", post(door::lock_handler))
        .route("/door/unlock", post(door::unlock_handler))
        .route("/door/toggle", post(door::toggle_handler))
        .route("/door/status", get(door::status_handler))
        .route("/ws/status", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Dashboard administration
    let mut admin_routes = Router::new()
        .route("/door/update-passcode", post(door::update_passcode_handler))
        .route("/door/update-surname", post(door::update_surname_handler))
        .route(
            "/logs",
            get(rest::list_logs_handler).post(rest::create_log_handler),
        )
        .route(
            "/settings",
            get(rest::get_settings_handler).patch(rest::update_settings_handler),
        )
        .route(
            "/users",
            get(rest::list_users_handler).post(rest::create_user_handler),
        )
        .route(
            "/users/{id}",
            patch(rest::update_user_handler).delete(rest::delete_user_handler),
        );
    if state.config.require_auth_for_admin {
        admin_routes = admin_routes.layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));
    }

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(state)
}
