use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints a client uses before it has a session. None of them take an `AuthUser`, so
/// they answer without a cookie; the guard does not intercept `/api` or `/health`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe. Excluded from the guard entirely.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Verifies credentials and sets the `session` cookie.
        .route("/api/auth/login", post(handlers::login))
        // POST /api/auth/register
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/forgot-password
        // Always answers with the same message so it cannot be used to probe for accounts.
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        // POST /api/auth/reset-password
        .route("/api/auth/reset-password", post(handlers::reset_password))
        // GET /api/setup-admin
        // Creates or promotes the configured administrator. Safe to call repeatedly.
        .route("/api/setup-admin", get(handlers::setup_admin))
}
