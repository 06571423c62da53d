use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use bmi_tracker::{
    AppConfig, AppState, MemoryRepository, RouteTable, create_router,
    guard::{DenialReason, GuardDecision, RouteClass},
    models::{PublicUser, Role},
    repository::RepositoryState,
    routes::pages::PAGES,
    session::Session,
};
use chrono::{Duration, Utc};
use tower::ServiceExt;

// --- Helpers ---

fn test_state() -> AppState {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    AppState::new(repo, AppConfig::default())
}

fn session(role: Role) -> Session {
    let user = PublicUser {
        id: 7,
        username: "guarded".to_string(),
        role,
    };
    Session::issue(&user, Utc::now(), Duration::hours(1)).unwrap()
}

fn cookie_for(state: &AppState, session: &Session) -> String {
    format!("session={}", state.sessions.encode(session).unwrap())
}

async fn get(app: Router, path: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn assert_redirect(response: &Response, to: &str) {
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], to);
}

fn assert_passed(response: &Response) {
    assert_ne!(
        response.status(),
        StatusCode::TEMPORARY_REDIRECT,
        "expected pass-through, got redirect to {:?}",
        response.headers().get(header::LOCATION)
    );
}

// --- Decision table ---

#[test]
fn test_classify_uses_segment_boundaries() {
    let table = RouteTable::default();

    assert_eq!(table.classify("/login"), RouteClass::Public);
    assert_eq!(table.classify("/login/"), RouteClass::Public);
    assert_eq!(table.classify("/api/auth/login"), RouteClass::Public);
    assert_eq!(table.classify("/admin"), RouteClass::AdminOnly);
    assert_eq!(table.classify("/admin/stats"), RouteClass::AdminOnly);
    assert_eq!(table.classify("/administrator"), RouteClass::Protected);
    assert_eq!(table.classify("/loginx"), RouteClass::Protected);
    assert_eq!(table.classify("/api/admin/stats"), RouteClass::Protected);
    assert_eq!(table.classify("/dashboard"), RouteClass::Protected);
    assert_eq!(table.classify("/"), RouteClass::Protected);
}

#[test]
fn test_excluded_paths() {
    let table = RouteTable::default();

    assert!(table.is_excluded("/health"));
    assert!(table.is_excluded("/static/app.js"));
    assert!(table.is_excluded("/favicon.ico"));
    assert!(table.is_excluded("/swagger-ui/index.html"));
    assert!(table.is_excluded("/api-docs/openapi.json"));
    assert!(table.is_excluded("/api/me"));
    assert!(table.is_excluded("/api/admin/stats"));
    assert!(!table.is_excluded("/staticky"));
    assert!(!table.is_excluded("/apiary"));
}

#[test]
fn test_decide_without_session() {
    let table = RouteTable::default();

    assert_eq!(table.decide("/login", None), GuardDecision::Pass);
    assert_eq!(table.decide("/reset-password", None), GuardDecision::Pass);
    assert_eq!(
        table.decide("/dashboard", None),
        GuardDecision::Redirect {
            to: "/login",
            reason: DenialReason::AuthenticationAbsent
        }
    );
    // The first rule wins over the admin rule.
    assert_eq!(
        table.decide("/admin", None),
        GuardDecision::Redirect {
            to: "/login",
            reason: DenialReason::AuthenticationAbsent
        }
    );
}

#[test]
fn test_decide_with_session() {
    let table = RouteTable::default();
    let user = session(Role::User);
    let admin = session(Role::Admin);

    assert_eq!(table.decide("/dashboard", Some(&user)), GuardDecision::Pass);
    assert_eq!(
        table.decide("/register", Some(&user)),
        GuardDecision::Redirect {
            to: "/",
            reason: DenialReason::AlreadySignedIn
        }
    );
    // Only the exact login/register pages bounce a signed-in user.
    assert_eq!(table.decide("/forgot-password", Some(&user)), GuardDecision::Pass);
    assert_eq!(
        table.decide("/admin/stats", Some(&user)),
        GuardDecision::Redirect {
            to: "/",
            reason: DenialReason::AuthorizationDenied
        }
    );
    assert_eq!(table.decide("/admin/stats", Some(&admin)), GuardDecision::Pass);
}

#[test]
fn test_custom_table_is_first_match_wins() {
    let table = RouteTable::new(
        vec![
            ("/admin/public", RouteClass::Public),
            ("/admin", RouteClass::AdminOnly),
        ],
        vec![],
    );

    assert_eq!(table.classify("/admin/public/help"), RouteClass::Public);
    assert_eq!(table.classify("/admin/other"), RouteClass::AdminOnly);
}

#[test]
fn test_every_page_agrees_with_guard_classification() {
    let table = RouteTable::default();

    for page in PAGES {
        assert_eq!(
            table.classify(page.path),
            page.access,
            "page {} is declared {:?}",
            page.path,
            page.access
        );
    }
}

// --- Scenarios through the router ---

#[tokio::test]
async fn test_protected_path_without_cookie_redirects_to_login() {
    let app = create_router(test_state());

    let response = get(app, "/dashboard", None).await;
    assert_redirect(&response, "/login");
}

#[tokio::test]
async fn test_protected_page_with_valid_cookie_passes() {
    let state = test_state();
    let cookie = cookie_for(&state, &session(Role::User));
    let app = create_router(state);

    let response = get(app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_with_valid_cookie_reaches_fallback() {
    let state = test_state();
    let cookie = cookie_for(&state, &session(Role::User));
    let app = create_router(state);

    let response = get(app, "/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_cookie_is_treated_as_no_session() {
    let state = test_state();
    let user = PublicUser {
        id: 7,
        username: "stale".to_string(),
        role: Role::Admin,
    };
    let expired = Session::issue(&user, Utc::now() - Duration::hours(3), Duration::hours(1)).unwrap();
    let cookie = cookie_for(&state, &expired);
    let app = create_router(state);

    let response = get(app.clone(), "/reports", Some(&cookie)).await;
    assert_redirect(&response, "/login");

    // Public pages stay reachable instead of bouncing back to home.
    let response = get(app, "/login", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_cookie_redirects_to_login() {
    let state = test_state();
    let cookie = format!("{}tampered", cookie_for(&state, &session(Role::Admin)));
    let app = create_router(state);

    let response = get(app, "/dashboard", Some(&cookie)).await;
    assert_redirect(&response, "/login");
}

#[tokio::test]
async fn test_signed_in_user_is_sent_home_from_login_and_register() {
    let state = test_state();
    let cookie = cookie_for(&state, &session(Role::User));
    let app = create_router(state);

    for path in ["/login", "/login?next=/reports", "/register", "/register/"] {
        let response = get(app.clone(), path, Some(&cookie)).await;
        assert_redirect(&response, "/");
    }
}

#[tokio::test]
async fn test_admin_prefix_requires_admin_role() {
    let state = test_state();
    let user_cookie = cookie_for(&state, &session(Role::User));
    let admin_cookie = cookie_for(&state, &session(Role::Admin));
    let app = create_router(state);

    let response = get(app.clone(), "/admin/stats", Some(&user_cookie)).await;
    assert_redirect(&response, "/");

    let response = get(app.clone(), "/admin/stats", Some(&admin_cookie)).await;
    assert_passed(&response);

    let response = get(app.clone(), "/admin", Some(&admin_cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(app, "/admin", None).await;
    assert_redirect(&response, "/login");
}

#[tokio::test]
async fn test_admin_prefix_does_not_cover_similar_paths() {
    let state = test_state();
    let cookie = cookie_for(&state, &session(Role::User));
    let app = create_router(state);

    let response = get(app, "/administrator", Some(&cookie)).await;
    assert_passed(&response);
}

#[tokio::test]
async fn test_public_pages_reachable_without_session() {
    let app = create_router(test_state());

    for page in PAGES.iter().filter(|p| p.access == RouteClass::Public) {
        let response = get(app.clone(), page.path, None).await;
        assert_eq!(response.status(), StatusCode::OK, "page {}", page.path);
    }
}

#[tokio::test]
async fn test_excluded_paths_bypass_guard() {
    let app = create_router(test_state());

    let response = get(app.clone(), "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(app, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_paths_answer_401_instead_of_redirecting() {
    let state = test_state();
    let cookie = cookie_for(&state, &session(Role::Admin));
    let app = create_router(state);

    let response = get(app.clone(), "/api/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let me: PublicUser = serde_json::from_slice(&body).unwrap();
    assert_eq!(me.username, "guarded");
    assert_eq!(me.role, Role::Admin);

    let response = get(app.clone(), "/api/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(app.clone(), "/api/admin/stats", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/bmi")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"weight": 70.0, "height": 175.0}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::LOCATION).is_none());
}
