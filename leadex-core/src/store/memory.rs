use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use leadex_model::{Agent, AgentId, ClaimAttempt, ClaimAttemptId, Lead, LeadId, LeadStatus};

use crate::error::{LeadError, Result};
use crate::store::ports::{
    AgentRepository, AgentUpdate, ClaimAuditRepository, CreatedLead, LeadRepository,
    LeadTransition, NewAgent, NewClaimAttempt, NewLead,
};

#[derive(Debug, Default)]
struct MemoryState {
    leads: HashMap<LeadId, Lead>,
    leads_by_key: HashMap<String, LeadId>,
    agents: HashMap<AgentId, Agent>,
    attempts: Vec<ClaimAttempt>,
}

/// Process-scoped lead store.
///
/// Every operation acquires the single state lock exactly once, so
/// `try_transition` is a genuine compare-and-swap: the status comparison and
/// the write happen under one critical section. Valid only for
/// single-instance deployments and tests; multi-instance deployments use the
/// Postgres store.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    state: Mutex<MemoryState>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadRepository for MemoryLeadStore {
    async fn create(&self, lead: NewLead) -> Result<CreatedLead> {
        let mut state = self.state.lock().await;

        if let Some(existing_id) = state.leads_by_key.get(&lead.idempotency_key) {
            let existing = state
                .leads
                .get(existing_id)
                .cloned()
                .ok_or_else(|| LeadError::Storage("idempotency key points at missing lead".into()))?;
            return Ok(CreatedLead {
                lead: existing,
                created: false,
            });
        }

        let record = Lead {
            id: LeadId::new(),
            contact_name: lead.contact_name,
            contact_address: lead.contact_address,
            message: lead.message,
            suggested_reply: lead.suggested_reply,
            status: LeadStatus::Pending,
            idempotency_key: lead.idempotency_key.clone(),
            created_at: Utc::now(),
            expires_at: lead.expires_at,
            assumed_by: None,
            assumed_at: None,
            version: 0,
        };

        state.leads_by_key.insert(lead.idempotency_key, record.id);
        state.leads.insert(record.id, record.clone());

        Ok(CreatedLead {
            lead: record,
            created: true,
        })
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>> {
        let state = self.state.lock().await;
        Ok(state.leads.get(&id).cloned())
    }

    async fn try_transition(
        &self,
        id: LeadId,
        expected: LeadStatus,
        transition: LeadTransition,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(lead) = state.leads.get_mut(&id) else {
            return Ok(false);
        };

        if lead.status != expected {
            return Ok(false);
        }

        match transition {
            LeadTransition::Assume { agent_id, at } => {
                lead.status = LeadStatus::Assumed;
                lead.assumed_by = Some(agent_id);
                lead.assumed_at = Some(at);
            }
            LeadTransition::Expire => lead.status = LeadStatus::Expired,
            LeadTransition::Reject => lead.status = LeadStatus::Rejected,
        }
        lead.version += 1;

        Ok(true)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>> {
        let state = self.state.lock().await;
        let mut stale: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| lead.status == LeadStatus::Pending && lead.expires_at <= now)
            .cloned()
            .collect();
        stale.sort_by_key(|lead| lead.expires_at);
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }
}

#[async_trait]
impl AgentRepository for MemoryLeadStore {
    async fn insert(&self, agent: NewAgent) -> Result<Agent> {
        let mut state = self.state.lock().await;
        let record = Agent {
            id: AgentId::new(),
            display_name: agent.display_name,
            notification_address: agent.notification_address,
            available: false,
            last_seen_at: Utc::now(),
        };
        state.agents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: AgentId) -> Result<Option<Agent>> {
        let state = self.state.lock().await;
        Ok(state.agents.get(&id).cloned())
    }

    async fn update(&self, id: AgentId, update: AgentUpdate, now: DateTime<Utc>) -> Result<Agent> {
        let mut state = self.state.lock().await;
        let agent = state
            .agents
            .get_mut(&id)
            .ok_or_else(|| LeadError::NotFound(format!("agent {id}")))?;

        if let Some(available) = update.available {
            agent.available = available;
        }
        if let Some(address) = update.notification_address {
            agent.notification_address = address;
        }
        agent.last_seen_at = now;

        Ok(agent.clone())
    }

    async fn list_available(&self) -> Result<Vec<Agent>> {
        let state = self.state.lock().await;
        let mut available: Vec<Agent> = state
            .agents
            .values()
            .filter(|agent| agent.available)
            .cloned()
            .collect();
        available.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(available)
    }
}

#[async_trait]
impl ClaimAuditRepository for MemoryLeadStore {
    async fn record(&self, attempt: NewClaimAttempt) -> Result<ClaimAttempt> {
        let mut state = self.state.lock().await;
        let record = ClaimAttempt {
            id: ClaimAttemptId::new(),
            lead_id: attempt.lead_id,
            agent_id: attempt.agent_id,
            received_at: attempt.received_at,
            outcome: attempt.outcome,
            recorded_at: Utc::now(),
        };
        state.attempts.push(record.clone());
        Ok(record)
    }

    async fn list_for_lead(&self, lead_id: LeadId) -> Result<Vec<ClaimAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .iter()
            .filter(|attempt| attempt.lead_id == lead_id)
            .cloned()
            .collect())
    }
}
