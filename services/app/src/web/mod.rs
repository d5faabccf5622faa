pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use rest::{
    delete_saved_handler, generate_summary_handler, get_saved_handler, list_saved_handler,
    save_record_handler,
};
use auth::{login_handler, logout_handler, me_handler, register_handler, update_profile_handler};
use state::AppState;

/// Builds the API router. Saving and browsing the collection require a stored login;
/// generating a summary and the auth endpoints do not.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no login required)
    let public_routes = Router::new()
        .route("/summaries", post(generate_summary_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler));

    // Protected routes (login required)
    let protected_routes = Router::new()
        .route("/saved", get(list_saved_handler).post(save_record_handler))
        .route(
            "/saved/{id}",
            get(get_saved_handler).delete(delete_saved_handler),
        )
        .route("/auth/profile", put(update_profile_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}
