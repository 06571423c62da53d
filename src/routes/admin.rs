use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Nested under `/api/admin`. The guard only protects the `/admin` page prefix, so these
/// handlers enforce the role themselves through the `AdminUser` extractor (403 for a regular
/// user).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Dashboard counts and the newest accounts.
        .route("/stats", get(handlers::get_admin_stats))
}
