use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use leadex_core::store::{AgentUpdate, NewAgent};
use leadex_model::{Agent, AgentId};

use crate::{AppState, errors::AppError, errors::AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterAgentRequest {
    pub display_name: String,
    pub notification_address: String,
}

/// `POST /agents`: register an agent. Agents start unavailable and opt in
/// via `PATCH /agents/{id}`.
pub async fn register_agent_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> AppResult<(StatusCode, Json<Agent>)> {
    let agent = state
        .directory
        .register(NewAgent {
            display_name: request.display_name,
            notification_address: request.notification_address,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub notification_address: Option<String>,
}

/// `PATCH /agents/{id}`: agent self-service availability/address update.
pub async fn update_agent_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAgentRequest>,
) -> AppResult<Json<Agent>> {
    let agent = state
        .directory
        .update(
            AgentId(id),
            AgentUpdate {
                available: request.available,
                notification_address: request.notification_address,
            },
        )
        .await?;
    Ok(Json(agent))
}

/// `GET /agents/{id}`
pub async fn get_agent_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Agent>> {
    let agent = state
        .directory
        .get(AgentId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("agent {id}")))?;
    Ok(Json(agent))
}
