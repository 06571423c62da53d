use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Everything a signed-in user does with their own data. Each handler takes an `AuthUser`
/// and scopes its queries to that id.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
        // POST /api/auth/logout
        // Drops the cookie; the token is not revoked server-side.
        .route("/api/auth/logout", post(handlers::logout))
        // POST/GET /api/bmi
        // Record a measurement, or list the full history newest first.
        .route(
            "/api/bmi",
            post(handlers::create_bmi_record).get(handlers::list_bmi_records),
        )
        // GET /api/reports?type=daily|weekly|monthly|yearly
        .route("/api/reports", get(handlers::get_report))
}
