use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use leadex_model::LeadId;

use crate::config::ClaimConfig;
use crate::error::{LeadError, Result};
use crate::fanout::FanoutNotifier;
use crate::store::ports::{LeadRepository, NewLead};

/// Validated lead-creation event from the intake channel. Anything that
/// reaches this type has already passed boundary parsing; the service still
/// rejects blank fields before touching storage.
#[derive(Debug, Clone)]
pub struct IncomingLead {
    pub contact_name: String,
    pub contact_address: String,
    pub message: String,
    pub suggested_reply: Option<String>,
    /// Derived from the originating message; the same event redelivered
    /// carries the same key.
    pub idempotency_key: String,
}

/// What the caller gets back. `created` is false on an idempotent replay.
#[derive(Debug, Clone, Copy)]
pub struct IntakeReceipt {
    pub lead_id: LeadId,
    pub created: bool,
}

/// Entry point for inbound leads: validates, writes the pending record, and
/// triggers fanout exactly once per distinct lead.
pub struct LeadIntakeService {
    leads: Arc<dyn LeadRepository>,
    fanout: Arc<FanoutNotifier>,
    claim_ttl: chrono::Duration,
}

impl fmt::Debug for LeadIntakeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeadIntakeService")
            .field("claim_ttl", &self.claim_ttl)
            .finish_non_exhaustive()
    }
}

impl LeadIntakeService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        fanout: Arc<FanoutNotifier>,
        claim: &ClaimConfig,
    ) -> Self {
        Self {
            leads,
            fanout,
            claim_ttl: claim.ttl(),
        }
    }

    /// Override the claim TTL (primarily for tests).
    pub fn with_claim_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    /// Ingest one lead-creation event.
    ///
    /// Storage failures propagate to the caller (fail closed); the caller is
    /// expected to retry with the same idempotency key. Fanout runs detached
    /// so the response never waits on notification delivery.
    pub async fn submit(&self, incoming: IncomingLead) -> Result<IntakeReceipt> {
        validate(&incoming)?;

        let now = Utc::now();
        let created = self
            .leads
            .create(NewLead {
                contact_name: incoming.contact_name,
                contact_address: incoming.contact_address,
                message: incoming.message,
                suggested_reply: incoming.suggested_reply,
                idempotency_key: incoming.idempotency_key,
                expires_at: now + self.claim_ttl,
            })
            .await?;

        if created.created {
            info!(
                "lead {} accepted, claimable until {}",
                created.lead.id, created.lead.expires_at
            );
            let fanout = self.fanout.clone();
            let lead = created.lead.clone();
            tokio::spawn(async move {
                fanout.dispatch(&lead).await;
            });
        } else {
            debug!(
                "duplicate intake for lead {} (idempotency key matched); fanout skipped",
                created.lead.id
            );
        }

        Ok(IntakeReceipt {
            lead_id: created.lead.id,
            created: created.created,
        })
    }
}

fn validate(incoming: &IncomingLead) -> Result<()> {
    if incoming.contact_name.trim().is_empty() {
        return Err(LeadError::Validation("contact name must not be empty".into()));
    }
    if incoming.contact_address.trim().is_empty() {
        return Err(LeadError::Validation(
            "contact address must not be empty".into(),
        ));
    }
    if incoming.message.trim().is_empty() {
        return Err(LeadError::Validation("message must not be empty".into()));
    }
    if incoming.idempotency_key.trim().is_empty() {
        return Err(LeadError::Validation(
            "idempotency key must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_fail_validation() {
        let incoming = IncomingLead {
            contact_name: "  ".into(),
            contact_address: "+551199".into(),
            message: "hello".into(),
            suggested_reply: None,
            idempotency_key: "k".into(),
        };
        assert!(matches!(
            validate(&incoming),
            Err(LeadError::Validation(_))
        ));
    }

    #[test]
    fn complete_payload_passes_validation() {
        let incoming = IncomingLead {
            contact_name: "Maria".into(),
            contact_address: "+551199".into(),
            message: "hello".into(),
            suggested_reply: Some("hi!".into()),
            idempotency_key: "k".into(),
        };
        assert!(validate(&incoming).is_ok());
    }
}
