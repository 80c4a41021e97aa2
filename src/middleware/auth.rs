//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::jwt::Claims;
use crate::error::ApiError;
use crate::helpers::{get_organization_id, get_user_id};
use crate::AppState;

/// The authenticated caller and the organization they are acting in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizationContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
}

/// Validates JWT access tokens and stores claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized("Missing authorization header", "MISSING_AUTH_HEADER")
                .into_response()
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::unauthorized("Invalid authorization header format", "INVALID_AUTH_FORMAT")
            .into_response()
    })?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Requires organization context in the token. Runs after [`auth_middleware`].
pub async fn organization_auth_middleware(
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        ApiError::unauthorized("Missing authorization header", "MISSING_AUTH_HEADER")
            .into_response()
    })?;

    let context = OrganizationContext {
        user_id: get_user_id(&claims).map_err(IntoResponse::into_response)?,
        organization_id: get_organization_id(&claims).map_err(IntoResponse::into_response)?,
    };

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}
