use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadex_model::{Agent, AgentId, ClaimAttempt, ClaimOutcome, Lead, LeadId, LeadStatus};

use crate::error::Result;

/// Input for lead creation. `expires_at` is computed by the intake gateway
/// (now + TTL) and immutable afterwards.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub contact_name: String,
    pub contact_address: String,
    pub message: String,
    pub suggested_reply: Option<String>,
    pub idempotency_key: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a create call. `created` is false when the idempotency key
/// matched an existing lead, in which case `lead` is that earlier record and
/// the caller must not fan out again.
#[derive(Debug, Clone)]
pub struct CreatedLead {
    pub lead: Lead,
    pub created: bool,
}

/// The three legal transitions out of `Pending`. The assumed-by fields ride
/// in the same atomic write as the status change.
#[derive(Debug, Clone, Copy)]
pub enum LeadTransition {
    Assume {
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
    Expire,
    Reject,
}

impl LeadTransition {
    pub fn target_status(&self) -> LeadStatus {
        match self {
            LeadTransition::Assume { .. } => LeadStatus::Assumed,
            LeadTransition::Expire => LeadStatus::Expired,
            LeadTransition::Reject => LeadStatus::Rejected,
        }
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Insert a new pending lead, enforcing idempotency-key uniqueness.
    /// A duplicate key returns the existing lead with `created = false`.
    async fn create(&self, lead: NewLead) -> Result<CreatedLead>;

    async fn get(&self, id: LeadId) -> Result<Option<Lead>>;

    /// Atomically apply `transition` if and only if the lead's current status
    /// equals `expected`. Returns whether the write applied; a missing lead
    /// reports `false`. Of any number of concurrent callers racing on the
    /// same lead, at most one observes `true`; the rest observe a no-op.
    /// This is the sole mutual-exclusion primitive of the subsystem.
    async fn try_transition(
        &self,
        id: LeadId,
        expected: LeadStatus,
        transition: LeadTransition,
    ) -> Result<bool>;

    /// Pending leads whose deadline has passed, oldest deadline first. Feed
    /// for the expiry sweeper.
    async fn list_expired_pending(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>>;
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub display_name: String,
    pub notification_address: String,
}

/// Partial self-update for an agent. Absent fields are left untouched;
/// `last_seen_at` is refreshed on every update.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub available: Option<bool>,
    pub notification_address: Option<String>,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, agent: NewAgent) -> Result<Agent>;

    async fn get(&self, id: AgentId) -> Result<Option<Agent>>;

    async fn update(&self, id: AgentId, update: AgentUpdate, now: DateTime<Utc>) -> Result<Agent>;

    /// Snapshot of agents currently flagged available. Eventually consistent
    /// with respect to concurrent toggles; used for notification targeting
    /// only, never for claim acceptance.
    async fn list_available(&self) -> Result<Vec<Agent>>;
}

#[derive(Debug, Clone)]
pub struct NewClaimAttempt {
    pub lead_id: LeadId,
    pub agent_id: AgentId,
    pub received_at: DateTime<Utc>,
    pub outcome: ClaimOutcome,
}

#[async_trait]
pub trait ClaimAuditRepository: Send + Sync {
    /// Append one attempt to the audit trail. Never mutates earlier rows.
    async fn record(&self, attempt: NewClaimAttempt) -> Result<ClaimAttempt>;

    async fn list_for_lead(&self, lead_id: LeadId) -> Result<Vec<ClaimAttempt>>;
}
