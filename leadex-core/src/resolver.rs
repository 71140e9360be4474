use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use leadex_model::{AgentId, ClaimOutcome, LeadId, LeadStatus};

use crate::error::{LeadError, Result};
use crate::store::ports::{ClaimAuditRepository, LeadRepository, LeadTransition, NewClaimAttempt};

/// One inbound claim event, already parsed and validated at the boundary.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRequest {
    pub lead_id: LeadId,
    pub agent_id: AgentId,
    pub received_at: DateTime<Utc>,
}

/// Resolution of one claim attempt. Losses are ordinary results.
#[derive(Debug, Clone, Copy)]
pub struct ClaimResolution {
    pub lead_id: LeadId,
    pub agent_id: AgentId,
    pub outcome: ClaimOutcome,
}

/// Awards each lead to at most one agent.
///
/// The winner is decided by a single storage-layer conditional transition,
/// never by an application-level read-then-write: concurrent resolvers on
/// any number of instances may all observe a pending lead, but only one
/// conditional write applies.
pub struct ClaimResolver {
    leads: Arc<dyn LeadRepository>,
    audit: Arc<dyn ClaimAuditRepository>,
}

impl fmt::Debug for ClaimResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimResolver").finish_non_exhaustive()
    }
}

impl ClaimResolver {
    pub fn new(leads: Arc<dyn LeadRepository>, audit: Arc<dyn ClaimAuditRepository>) -> Self {
        Self { leads, audit }
    }

    /// Process one claim event and return its outcome.
    ///
    /// A claim received at or past the deadline loses regardless of the
    /// stored status, so a late claim is rejected even when the sweeper has
    /// not yet expired the lead.
    pub async fn resolve(&self, request: ClaimRequest) -> Result<ClaimResolution> {
        let lead = self
            .leads
            .get(request.lead_id)
            .await?
            .ok_or_else(|| LeadError::NotFound(format!("lead {}", request.lead_id)))?;

        if request.received_at >= lead.expires_at {
            debug!(
                "claim for lead {} by agent {} arrived after the deadline",
                request.lead_id, request.agent_id
            );
            return self.conclude(request, ClaimOutcome::LostExpired).await;
        }

        let won = self
            .leads
            .try_transition(
                request.lead_id,
                LeadStatus::Pending,
                LeadTransition::Assume {
                    agent_id: request.agent_id,
                    at: request.received_at,
                },
            )
            .await?;

        if won {
            info!(
                "lead {} assumed by agent {}",
                request.lead_id, request.agent_id
            );
            return self.conclude(request, ClaimOutcome::Won).await;
        }

        // Lost the conditional write; classify against the settled state.
        let lead = self
            .leads
            .get(request.lead_id)
            .await?
            .ok_or_else(|| LeadError::NotFound(format!("lead {}", request.lead_id)))?;

        let outcome = match lead.status {
            LeadStatus::Assumed if lead.assumed_by == Some(request.agent_id) => {
                // Redelivered winning claim: same answer, no state change.
                debug!(
                    "agent {} repeated its winning claim for lead {}",
                    request.agent_id, request.lead_id
                );
                ClaimOutcome::Won
            }
            LeadStatus::Assumed => ClaimOutcome::LostAlreadyClaimed,
            LeadStatus::Expired | LeadStatus::Rejected => ClaimOutcome::LostExpired,
            LeadStatus::Pending => {
                // The conditional write reported no-op while the lead still
                // reads pending; treat as a transient conflict the caller may
                // retry.
                warn!(
                    "claim transition for lead {} reported no-op but lead is still pending",
                    request.lead_id
                );
                return Err(LeadError::Conflict(format!(
                    "lead {} state changed concurrently; retry",
                    request.lead_id
                )));
            }
        };

        self.conclude(request, outcome).await
    }

    async fn conclude(
        &self,
        request: ClaimRequest,
        outcome: ClaimOutcome,
    ) -> Result<ClaimResolution> {
        self.audit
            .record(NewClaimAttempt {
                lead_id: request.lead_id,
                agent_id: request.agent_id,
                received_at: request.received_at,
                outcome,
            })
            .await?;

        Ok(ClaimResolution {
            lead_id: request.lead_id,
            agent_id: request.agent_id,
            outcome,
        })
    }
}
