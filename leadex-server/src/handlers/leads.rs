use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadex_core::intake::IncomingLead;
use leadex_core::resolver::ClaimRequest;
use leadex_core::store::{ClaimAuditRepository, LeadRepository, LeadTransition};
use leadex_model::{AgentId, ClaimAttempt, ClaimOutcome, Lead, LeadId, LeadStatus};

use crate::{AppState, errors::AppError, errors::AppResult};

/// Inbound lead-creation payload. Unknown fields are rejected at the
/// boundary rather than passed inward.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateLeadRequest {
    pub contact_name: String,
    pub contact_address: String,
    pub message: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub suggested_reply: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadResponse {
    pub lead_id: LeadId,
}

/// `POST /leads`: ingest one lead. Replaying the same idempotency key
/// returns the original lead id with 200 instead of 201 and does not fan out
/// again.
pub async fn create_lead_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateLeadRequest>,
) -> AppResult<(StatusCode, Json<CreateLeadResponse>)> {
    let receipt = state
        .intake
        .submit(IncomingLead {
            contact_name: request.contact_name,
            contact_address: request.contact_address,
            message: request.message,
            suggested_reply: request.suggested_reply,
            idempotency_key: request.idempotency_key,
        })
        .await?;

    let status = if receipt.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(CreateLeadResponse {
            lead_id: receipt.lead_id,
        }),
    ))
}

/// `GET /leads/{id}`
pub async fn get_lead_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lead>> {
    let lead = state
        .leads
        .get(LeadId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("lead {id}")))?;
    Ok(Json(lead))
}

/// Inbound claim event. `receivedAt` is optional; claims relayed by the
/// messaging channel may carry their own receipt time.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClaimLeadRequest {
    pub agent_id: AgentId,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimLeadResponse {
    pub outcome: ClaimOutcome,
}

/// `POST /leads/{id}/claims`: resolve one claim attempt. Losing is an
/// ordinary response, never an error status.
pub async fn claim_lead_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimLeadRequest>,
) -> AppResult<Json<ClaimLeadResponse>> {
    let received_at = request.received_at.unwrap_or_else(Utc::now);

    let resolution = state
        .resolver
        .resolve(ClaimRequest {
            lead_id: LeadId(id),
            agent_id: request.agent_id,
            received_at,
        })
        .await?;

    if resolution.outcome == ClaimOutcome::LostAlreadyClaimed {
        // Best-effort, policy-gated; never delays the response.
        let fanout = state.fanout.clone();
        tokio::spawn(async move {
            fanout
                .notify_claim_lost(resolution.lead_id, resolution.agent_id)
                .await;
        });
    }

    Ok(Json(ClaimLeadResponse {
        outcome: resolution.outcome,
    }))
}

/// `GET /leads/{id}/claims`: audit trail for one lead.
pub async fn list_lead_claims_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ClaimAttempt>>> {
    let lead_id = LeadId(id);
    state
        .leads
        .get(lead_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("lead {id}")))?;

    let attempts = state.audit.list_for_lead(lead_id).await?;
    Ok(Json(attempts))
}

/// `POST /leads/{id}/reject`: administrative close-out of a pending lead.
/// Settled leads report a conflict instead of changing state.
pub async fn reject_lead_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let lead_id = LeadId(id);
    state
        .leads
        .get(lead_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("lead {id}")))?;

    let rejected = state
        .leads
        .try_transition(lead_id, LeadStatus::Pending, LeadTransition::Reject)
        .await?;

    if rejected {
        Ok(StatusCode::NO_CONTENT)
    } else {
        let settled = state
            .leads
            .get(lead_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("lead {id}")))?;
        Err(AppError::conflict(format!(
            "lead {id} is already {}",
            settled.status
        )))
    }
}
