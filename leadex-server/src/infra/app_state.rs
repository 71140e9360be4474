use std::{fmt, sync::Arc};

use anyhow::Context;
use sqlx::PgPool;
use tracing::warn;
use url::Url;

use leadex_core::directory::AgentDirectoryService;
use leadex_core::fanout::{FanoutNotifier, HttpMessenger, LogMessenger, Messenger};
use leadex_core::intake::LeadIntakeService;
use leadex_core::resolver::ClaimResolver;
use leadex_core::store::{
    AgentRepository, ClaimAuditRepository, LeadRepository, MemoryLeadStore,
    PostgresAgentRepository, PostgresClaimAuditRepository, PostgresLeadRepository,
};
use leadex_core::sweeper::{EscalationSink, HttpEscalationSink};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub leads: Arc<dyn LeadRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub audit: Arc<dyn ClaimAuditRepository>,
    pub intake: Arc<LeadIntakeService>,
    pub resolver: Arc<ClaimResolver>,
    pub directory: Arc<AgentDirectoryService>,
    pub fanout: Arc<FanoutNotifier>,
    pub config: Arc<Config>,
    /// Present for Postgres-backed deployments; used by the health probe.
    pub pool: Option<PgPool>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Production wiring over Postgres repositories.
    pub fn with_postgres(pool: PgPool, config: Arc<Config>) -> anyhow::Result<Self> {
        let leads: Arc<dyn LeadRepository> = Arc::new(PostgresLeadRepository::new(pool.clone()));
        let agents: Arc<dyn AgentRepository> = Arc::new(PostgresAgentRepository::new(pool.clone()));
        let audit: Arc<dyn ClaimAuditRepository> =
            Arc::new(PostgresClaimAuditRepository::new(pool.clone()));
        Self::assemble(leads, agents, audit, Some(pool), config)
    }

    /// Single-process wiring over the in-memory store. Used by tests and
    /// embedded deployments.
    pub fn in_memory(config: Arc<Config>) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryLeadStore::new());
        Self::assemble(store.clone(), store.clone(), store, None, config)
    }

    fn assemble(
        leads: Arc<dyn LeadRepository>,
        agents: Arc<dyn AgentRepository>,
        audit: Arc<dyn ClaimAuditRepository>,
        pool: Option<PgPool>,
        config: Arc<Config>,
    ) -> anyhow::Result<Self> {
        let messenger: Arc<dyn Messenger> = match &config.notifier_endpoint {
            Some(endpoint) => {
                let endpoint: Url = endpoint
                    .parse()
                    .with_context(|| format!("invalid notifier endpoint: {endpoint}"))?;
                Arc::new(HttpMessenger::new(endpoint)?)
            }
            None => {
                warn!("no notifier endpoint configured; claim invitations will only be logged");
                Arc::new(LogMessenger)
            }
        };

        let fanout = Arc::new(FanoutNotifier::new(
            agents.clone(),
            messenger,
            config.distribution.notify.clone(),
        ));
        let intake = Arc::new(LeadIntakeService::new(
            leads.clone(),
            fanout.clone(),
            &config.distribution.claim,
        ));
        let resolver = Arc::new(ClaimResolver::new(leads.clone(), audit.clone()));
        let directory = Arc::new(AgentDirectoryService::new(agents.clone()));

        Ok(Self {
            leads,
            agents,
            audit,
            intake,
            resolver,
            directory,
            fanout,
            config,
            pool,
        })
    }

    /// Escalation sink for the expiry sweeper, when one is configured.
    pub fn escalation_sink(&self) -> anyhow::Result<Option<Arc<dyn EscalationSink>>> {
        match &self.config.escalation_endpoint {
            Some(endpoint) => {
                let endpoint: Url = endpoint
                    .parse()
                    .with_context(|| format!("invalid escalation endpoint: {endpoint}"))?;
                Ok(Some(Arc::new(HttpEscalationSink::new(endpoint)?)))
            }
            None => Ok(None),
        }
    }
}
