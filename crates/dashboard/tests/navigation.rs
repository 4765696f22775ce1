use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use flockdesk_auth::{DenialKind, GuardDecision, RETURN_URL_PARAM, TokenGrant, UserProfile};
use flockdesk_dashboard::{AppState, Resource};
use flockdesk_session::{AuthApi, LoginRequest, MemoryStorage, SessionConfig, SessionError};

/// Grants whatever roles the password names, e.g. `"ADMIN,POULTRY_MANAGER"`.
struct RoleEchoApi;

fn grant_for(username: &str, roles: &str) -> Value {
    json!({
        "accessToken": format!("cred-{username}"),
        "refreshToken": "refresh",
        "expiresIn": 1800,
        "roles": roles.split(',').filter(|r| !r.is_empty()).collect::<Vec<_>>(),
        "user": { "id": 7, "username": username }
    })
}

#[async_trait]
impl AuthApi for RoleEchoApi {
    async fn login(&self, request: &LoginRequest) -> Result<TokenGrant, SessionError> {
        serde_json::from_value(grant_for(&request.username, &request.password))
            .map_err(|e| SessionError::Parse(e.to_string()))
    }

    async fn refresh(&self, _refresh_credential: &str) -> Result<TokenGrant, SessionError> {
        Err(SessionError::SessionExpired)
    }
}

fn offline_state() -> AppState {
    AppState::with_parts(
        SessionConfig::default(),
        Arc::new(RoleEchoApi),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap()
}

async fn signed_in(roles: &str) -> AppState {
    let state = offline_state();
    state
        .store
        .login(&LoginRequest::new("wanjiru", roles))
        .await
        .unwrap();
    state
}

fn reason(decision: &GuardDecision) -> Option<DenialKind> {
    match decision {
        GuardDecision::Allow => None,
        GuardDecision::Redirect { reason, .. } => Some(*reason),
    }
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login_with_return_target() {
    let state = offline_state();

    assert!(state.navigate("/login").is_allowed());

    let decision = state.navigate("/batches/4?tab=feed");
    let redirect = decision.redirect().unwrap();
    assert_eq!(redirect.path, "/login");
    assert_eq!(redirect.param(RETURN_URL_PARAM), Some("/batches/4?tab=feed"));
    assert_eq!(reason(&decision), Some(DenialKind::NotAuthenticated));
}

#[tokio::test]
async fn anonymous_visitors_to_restricted_views_land_on_dashboard() {
    let state = offline_state();

    let decision = state.navigate("/users");
    assert_eq!(
        decision.redirect().unwrap().to_location(),
        "/dashboard?unauthorized=true"
    );
    assert_eq!(reason(&decision), Some(DenialKind::NotAdmin));

    let decision = state.navigate("/poultry");
    assert_eq!(decision.redirect().unwrap().to_location(), "/dashboard");
    assert_eq!(reason(&decision), Some(DenialKind::MissingRole));
}

#[tokio::test]
async fn signed_in_user_skips_the_login_view() {
    let state = signed_in("").await;

    let decision = state.navigate("/login");
    assert_eq!(decision.redirect().unwrap().path, "/dashboard");
    assert_eq!(reason(&decision), Some(DenialKind::AlreadyAuthenticated));
    assert!(state.navigate("/inventory").is_allowed());
}

#[tokio::test]
async fn users_view_requires_admin() {
    let manager = signed_in("POULTRY_MANAGER").await;
    let decision = manager.navigate("/users");
    assert_eq!(
        decision.redirect().unwrap().to_location(),
        "/dashboard?unauthorized=true"
    );
    assert!(manager.navigate("/poultry").is_allowed());

    let admin = signed_in("ROLE_ADMIN").await;
    assert!(admin.navigate("/users").is_allowed());
    assert!(admin.navigate("/poultry").is_allowed());
    assert!(admin.legacy.is_admin());
}

#[tokio::test]
async fn poultry_view_needs_a_matching_role() {
    let state = signed_in("ACCOUNTANT").await;

    let decision = state.navigate("/poultry");
    assert_eq!(decision.redirect().unwrap().to_location(), "/dashboard");
    assert_eq!(reason(&decision), Some(DenialKind::MissingRole));
}

#[tokio::test]
async fn only_expired_sessions_navigate_on_error() {
    let state = signed_in("ADMIN").await;

    let decision = state
        .handle_error("/costs", &SessionError::SessionExpired)
        .unwrap();
    assert_eq!(decision.redirect().unwrap().to_location(), "/login?returnUrl=%2Fcosts");

    assert!(state
        .handle_error("/costs", &SessionError::Api(500, "boom".to_string()))
        .is_none());
}

#[tokio::test]
async fn logout_through_legacy_facade_locks_views_again() {
    let state = signed_in("ADMIN").await;
    state.legacy.logout().await;

    assert!(!state.navigate("/dashboard").is_allowed());
    assert_eq!(state.store.credential(), None);
}

async fn list_batches(headers: HeaderMap) -> Response {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer cred-wanjiru") => {
            Json(json!([{ "id": 1, "name": "Broilers A", "birds": 500 }])).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn login(Json(body): Json<Value>) -> Json<Value> {
    let username = body["username"].as_str().unwrap_or_default();
    Json(grant_for(username, "ADMIN"))
}

#[tokio::test]
async fn dashboard_api_lists_through_the_gate() {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/batches", get(list_batches))
        .route("/api/health", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::default()
        .with_api_url(&base_url)
        .with_storage_path(dir.path().join("session.db"));
    let state = AppState::bootstrap(config).await.unwrap();
    assert!(state.api.health().await);

    let err = state.api.list::<Value>(Resource::Batches).await.unwrap_err();
    assert_eq!(err, SessionError::SessionExpired);

    let user: UserProfile = state
        .legacy
        .login("wanjiru", "any")
        .await
        .unwrap();
    assert_eq!(user.username, "wanjiru");

    let batches: Vec<Value> = state.api.list(Resource::Batches).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["birds"], 500);

    server.abort();
}
