use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{AppState, errors::AppError, errors::AppResult};

/// `GET /health`: liveness plus a storage ping for Postgres deployments.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    if let Some(pool) = &state.pool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::service_unavailable(format!("storage ping failed: {e}")))?;
    }

    Ok(Json(json!({ "status": "ok" })))
}
