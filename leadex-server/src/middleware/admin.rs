use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, errors::AppError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Gate for administrative routes. Requests must carry the shared admin
/// token; deployments without one configured refuse all admin actions.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return AppError::unauthorized("admin actions are disabled; no admin token configured")
            .into_response();
    };

    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(token) if token == expected => next.run(request).await,
        _ => AppError::unauthorized("missing or invalid admin token").into_response(),
    }
}
