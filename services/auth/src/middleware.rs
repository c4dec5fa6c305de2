//! Bearer token authentication for protected routes

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{error::AuthError, routes::AppState};

/// Resolve the bearer token through the gateway and attach the resulting
/// [`AuthContext`](crate::gateway::AuthContext) to the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::Unauthenticated)?;

    let context = state.gateway.authorize(bearer.token(), None).await?;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
