use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain logic.
pub mod bmi;
pub mod reports;

// Identity: token codec, password hashing, extractors and the route guard.
pub mod auth;
pub mod guard;
pub mod password;
pub mod session;

// HTTP surface and persistence.
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin, Pages).
pub mod routes;
use routes::{admin, authenticated, pages, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use guard::RouteTable;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::SessionCodec;

/// ApiDoc
///
/// OpenAPI document for every JSON endpoint, served at `/api-docs/openapi.json` and browsable
/// under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::register_user,
        handlers::forgot_password, handlers::reset_password, handlers::setup_admin,
        handlers::get_me, handlers::create_bmi_record, handlers::list_bmi_records,
        handlers::get_report, handlers::get_admin_stats
    ),
    components(
        schemas(
            models::Role, models::PublicUser, models::UserSummary, models::BmiRecord,
            models::BmiEntry, models::LoginRequest, models::RegisterUserRequest,
            models::ForgotPasswordRequest, models::ResetPasswordRequest,
            models::CreateBmiRequest, models::MessageResponse, models::LoginResponse,
            models::RegisterResponse, models::ForgotPasswordResponse,
            models::BmiCreatedResponse, models::BmiHistoryResponse, models::ReportResponse,
            models::AdminStats, bmi::BmiCategory, reports::ReportPeriod,
            reports::TrendSummary,
        )
    ),
    tags(
        (name = "bmi-tracker", description = "BMI Tracker API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable per-process state. Handlers take the whole thing; the guard and the
/// extractors pull single components through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Users, reset tokens and BMI records.
    pub repo: RepositoryState,
    pub config: AppConfig,
    /// Signs and verifies session tokens with the configured secret.
    pub sessions: SessionCodec,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    /// Builds the codec from `config.session_secret` and uses the default route table.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let sessions = SessionCodec::new(config.session_secret.as_bytes());
        Self {
            repo,
            config,
            sessions,
            routes: Arc::new(RouteTable::default()),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionCodec {
    fn from_ref(app_state: &AppState) -> SessionCodec {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<RouteTable> {
    fn from_ref(app_state: &AppState) -> Arc<RouteTable> {
        app_state.routes.clone()
    }
}

/// create_router
///
/// Assembles the routes, wraps all of them (fallback included) in the route guard, then adds
/// the observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: excluded from the guard by prefix.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/api/admin", admin::admin_routes())
        .merge(pages::page_routes())
        .fallback(handlers::not_found)
        // 3. Route Guard: `layer` (not `route_layer`) so unknown paths are guarded too.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ))
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` set by the layer above,
/// so every log line of a request (guard decisions included) correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
