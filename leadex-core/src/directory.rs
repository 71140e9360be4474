use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use leadex_model::{Agent, AgentId};

use crate::error::{LeadError, Result};
use crate::store::ports::{AgentRepository, AgentUpdate, NewAgent};

/// Directory of agents and their self-managed availability.
///
/// Availability is read-mostly and eventually consistent: a toggle racing a
/// fanout snapshot may briefly over- or under-notify, which is acceptable.
/// It only affects who gets invited, never who may win a claim.
pub struct AgentDirectoryService {
    agents: Arc<dyn AgentRepository>,
}

impl fmt::Debug for AgentDirectoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDirectoryService").finish_non_exhaustive()
    }
}

impl AgentDirectoryService {
    pub fn new(agents: Arc<dyn AgentRepository>) -> Self {
        Self { agents }
    }

    /// Register a new agent. Agents start unavailable and opt in themselves.
    pub async fn register(&self, new_agent: NewAgent) -> Result<Agent> {
        if new_agent.display_name.trim().is_empty() {
            return Err(LeadError::Validation("display name must not be empty".into()));
        }
        if new_agent.notification_address.trim().is_empty() {
            return Err(LeadError::Validation(
                "notification address must not be empty".into(),
            ));
        }

        let agent = self.agents.insert(new_agent).await?;
        info!("agent {} registered", agent.id);
        Ok(agent)
    }

    pub async fn get(&self, id: AgentId) -> Result<Option<Agent>> {
        self.agents.get(id).await
    }

    /// Apply an agent's own availability/address update and refresh its
    /// last-seen timestamp.
    pub async fn update(&self, id: AgentId, update: AgentUpdate) -> Result<Agent> {
        if update.available.is_none() && update.notification_address.is_none() {
            return Err(LeadError::Validation(
                "update must change availability or notification address".into(),
            ));
        }
        if let Some(address) = &update.notification_address {
            if address.trim().is_empty() {
                return Err(LeadError::Validation(
                    "notification address must not be empty".into(),
                ));
            }
        }

        let agent = self.agents.update(id, update, Utc::now()).await?;
        info!(
            "agent {} updated, available={}",
            agent.id, agent.available
        );
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeadStore;

    #[tokio::test]
    async fn registration_rejects_blank_names() {
        let store = Arc::new(MemoryLeadStore::new());
        let directory = AgentDirectoryService::new(store);
        let result = directory
            .register(NewAgent {
                display_name: " ".into(),
                notification_address: "+551199".into(),
            })
            .await;
        assert!(matches!(result, Err(LeadError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let store = Arc::new(MemoryLeadStore::new());
        let directory = AgentDirectoryService::new(store.clone());
        let agent = directory
            .register(NewAgent {
                display_name: "Ana".into(),
                notification_address: "+551199".into(),
            })
            .await
            .unwrap();

        let result = directory.update(agent.id, AgentUpdate::default()).await;
        assert!(matches!(result, Err(LeadError::Validation(_))));
    }

    #[tokio::test]
    async fn toggling_availability_refreshes_last_seen() {
        let store = Arc::new(MemoryLeadStore::new());
        let directory = AgentDirectoryService::new(store.clone());
        let agent = directory
            .register(NewAgent {
                display_name: "Ana".into(),
                notification_address: "+551199".into(),
            })
            .await
            .unwrap();
        assert!(!agent.available);

        let updated = directory
            .update(
                agent.id,
                AgentUpdate {
                    available: Some(true),
                    notification_address: None,
                },
            )
            .await
            .unwrap();
        assert!(updated.available);
        assert!(updated.last_seen_at >= agent.last_seen_at);
    }
}
