use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use serde_json::json;
use tracing::{debug, error, info, warn};

use leadex_model::{Agent, AgentId, Lead, LeadId};

use crate::config::{LoserNotificationPolicy, NotifyConfig};
use crate::error::{LeadError, Result};
use crate::store::ports::AgentRepository;

const SUMMARY_MESSAGE_LIMIT: usize = 160;

/// Invitation sent to every available agent when a lead arrives.
#[derive(Debug, Clone)]
pub struct ClaimInvitation {
    pub lead_id: LeadId,
    pub summary: String,
    /// Keyword the agent replies with to claim; the external channel routes
    /// the reply back as a claim event.
    pub claim_keyword: String,
}

/// Closed set of messages this core pushes outward. Anything the messaging
/// provider receives is one of these variants.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    ClaimInvitation(ClaimInvitation),
    ClaimLost { lead_id: LeadId },
}

/// Outbound transport to the external messaging provider. Fire-and-forget
/// from the core's perspective; provider-side delivery status is not modeled.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, notification_address: &str, message: &OutboundMessage) -> Result<()>;
}

/// Messenger that POSTs to an external send API.
#[derive(Debug, Clone)]
pub struct HttpMessenger {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpMessenger {
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LeadError::Notify(format!("failed to build send client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn send(&self, notification_address: &str, message: &OutboundMessage) -> Result<()> {
        let body = match message {
            OutboundMessage::ClaimInvitation(invitation) => json!({
                "kind": "claim_invitation",
                "to": notification_address,
                "leadId": invitation.lead_id,
                "summary": invitation.summary,
                "claimKeyword": invitation.claim_keyword,
            }),
            OutboundMessage::ClaimLost { lead_id } => json!({
                "kind": "claim_lost",
                "to": notification_address,
                "leadId": lead_id,
            }),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadError::Notify(format!("send request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LeadError::Notify(format!(
                "send API returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Messenger that only logs. Stands in when no send API is configured, so a
/// deployment without a provider still exercises the full intake path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, notification_address: &str, message: &OutboundMessage) -> Result<()> {
        debug!("outbound message for {notification_address}: {message:?}");
        Ok(())
    }
}

/// Dispatches claim invitations for a new lead to every available agent.
///
/// Sends run concurrently and independently; one slow or failing address
/// never blocks the others, and never blocks the lead from being claimed.
/// Delivery is at-least-once; duplicates are harmless because claiming is
/// idempotent.
pub struct FanoutNotifier {
    agents: Arc<dyn AgentRepository>,
    messenger: Arc<dyn Messenger>,
    config: NotifyConfig,
}

impl fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutNotifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FanoutNotifier {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        messenger: Arc<dyn Messenger>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            agents,
            messenger,
            config,
        }
    }

    /// Invite every currently-available agent to claim `lead`. Failures are
    /// contained per agent; this never returns an error to intake.
    pub async fn dispatch(&self, lead: &Lead) {
        let snapshot = match self.agents.list_available().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("fanout aborted for lead {}: {e}", lead.id);
                return;
            }
        };

        if snapshot.is_empty() {
            warn!("no available agents to invite for lead {}", lead.id);
            return;
        }

        info!(
            "inviting {} agents to claim lead {}",
            snapshot.len(),
            lead.id
        );

        let message = OutboundMessage::ClaimInvitation(self.invitation(lead));
        let sends = snapshot
            .iter()
            .map(|agent| self.deliver(agent, &message));
        futures::future::join_all(sends).await;
    }

    /// Tell a losing agent the lead is gone. Controlled by the loser policy;
    /// best-effort, single attempt.
    pub async fn notify_claim_lost(&self, lead_id: LeadId, agent_id: AgentId) {
        if self.config.loser_policy != LoserNotificationPolicy::Notify {
            return;
        }

        let agent = match self.agents.get(agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => return,
            Err(e) => {
                warn!("loser lookup failed for agent {agent_id}: {e}");
                return;
            }
        };

        let message = OutboundMessage::ClaimLost { lead_id };
        if let Err(e) = self
            .messenger
            .send(&agent.notification_address, &message)
            .await
        {
            warn!("loss notice for lead {lead_id} to agent {agent_id} failed: {e}");
        }
    }

    fn invitation(&self, lead: &Lead) -> ClaimInvitation {
        let mut excerpt: String = lead.message.chars().take(SUMMARY_MESSAGE_LIMIT).collect();
        if lead.message.chars().count() > SUMMARY_MESSAGE_LIMIT {
            excerpt.push('…');
        }
        ClaimInvitation {
            lead_id: lead.id,
            summary: format!(
                "{} ({}): {}",
                lead.contact_name, lead.contact_address, excerpt
            ),
            claim_keyword: self.config.claim_keyword.clone(),
        }
    }

    async fn deliver(&self, agent: &Agent, message: &OutboundMessage) {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self
                .messenger
                .send(&agent.notification_address, message)
                .await
            {
                Ok(()) => {
                    debug!("invitation delivered to agent {}", agent.id);
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    let delay_ms = self.jittered_delay_ms(attempt);
                    warn!(
                        "invitation to agent {} failed (attempt {attempt}): {e}; retrying in {delay_ms}ms",
                        agent.id
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => {
                    error!(
                        "giving up on invitation to agent {} after {attempt} attempts: {e}",
                        agent.id
                    );
                }
            }
        }
    }

    fn base_delay_ms(&self, attempt: u16) -> u64 {
        if attempt == 0 {
            return 0;
        }

        let exp = (attempt.saturating_sub(1)) as i32;
        let scaled = (self.config.backoff_base_ms as f64) * 2f64.powi(exp);
        let capped = scaled.min(self.config.backoff_max_ms as f64);
        capped.max(0.0) as u64
    }

    fn jittered_delay_ms(&self, attempt: u16) -> u64 {
        let base = self.base_delay_ms(attempt);
        if base == 0 {
            return 0;
        }

        let upper_cap = self.config.backoff_max_ms.max(1);
        let capped = base.min(upper_cap);
        let spread = (capped as f64 * 0.25).max(1.0);
        let lower = (capped as f64 - spread).max(1.0);
        let upper = (capped as f64 + spread).min(upper_cap as f64);

        let mut rng = rand::rng();
        rng.random_range(lower..=upper).round() as u64
    }
}
