//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::info;

use crate::{
    error::{AuthError, AuthResult},
    gateway::{AuthContext, AuthGateway, ClientInfo},
    middleware::auth_middleware,
    models::{LoginCredentials, NewUser, Provider},
    vault::CredentialVault,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: AuthGateway,
    pub vault: CredentialVault,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Request for linking a GitHub account
#[derive(Deserialize)]
pub struct ConnectGitHubRequest {
    pub github_token: String,
    pub github_username: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/sessions", get(list_sessions))
        .route("/github/connect", post(connect_github))
        .route("/github/status", get(github_status))
        .route("/github/disconnect", delete(disconnect_github))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse> {
    let client = ClientInfo {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        ip_address: connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
    };

    let credentials = LoginCredentials {
        email: payload.email,
        password: payload.password,
    };

    let issued = state
        .gateway
        .login(&credentials, payload.remember_me, &client)
        .await?;

    Ok(Json(issued))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> AuthResult<impl IntoResponse> {
    let issued = state.gateway.register(&payload).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// Identity behind the presented token
pub async fn me(Extension(context): Extension<AuthContext>) -> Json<AuthContext> {
    Json(context)
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> AuthResult<impl IntoResponse> {
    state.gateway.logout(bearer.token()).await?;

    Ok(Json(json!({
        "message": "Logged out successfully"
    })))
}

/// Logout from all devices
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> AuthResult<impl IntoResponse> {
    let revoked = state.gateway.logout_all(context.principal.id).await?;

    Ok(Json(json!({
        "message": "Logged out from all devices",
        "revoked": revoked
    })))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> AuthResult<impl IntoResponse> {
    let sessions = state
        .gateway
        .list_active_sessions(context.principal.id)
        .await?;

    Ok(Json(json!({ "sessions": sessions })))
}

/// Store an encrypted GitHub token for the caller
pub async fn connect_github(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ConnectGitHubRequest>,
) -> AuthResult<impl IntoResponse> {
    let token = payload.github_token.trim();
    if token.is_empty() {
        return Err(AuthError::Validation("GitHub token is required".to_string()));
    }

    let user_id = context.principal.id;
    state
        .vault
        .save(user_id, Provider::GitHub, token, payload.github_username, None)
        .await?;
    info!("GitHub connected for user: {}", user_id);

    let status = state.vault.status(user_id, Provider::GitHub).await?;

    Ok(Json(status))
}

pub async fn github_status(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> AuthResult<impl IntoResponse> {
    let status = state
        .vault
        .status(context.principal.id, Provider::GitHub)
        .await?;

    Ok(Json(status))
}

pub async fn disconnect_github(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> AuthResult<impl IntoResponse> {
    let disconnected = state
        .vault
        .revoke(context.principal.id, Provider::GitHub)
        .await?;

    Ok(Json(json!({
        "message": "GitHub account disconnected",
        "disconnected": disconnected
    })))
}
