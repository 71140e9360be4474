use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use leadex_model::{Lead, LeadStatus};

use crate::config::ClaimConfig;
use crate::error::{LeadError, Result};
use crate::store::ports::{LeadRepository, LeadTransition};

/// Best-effort signal for leads that expire unclaimed. Delivery failures are
/// logged and swallowed; they never affect the expired transition itself.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn lead_expired(&self, lead: &Lead) -> Result<()>;
}

/// Escalation sink that POSTs to a supervisory endpoint.
#[derive(Debug, Clone)]
pub struct HttpEscalationSink {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpEscalationSink {
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LeadError::Notify(format!("failed to build escalation client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl EscalationSink for HttpEscalationSink {
    async fn lead_expired(&self, lead: &Lead) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({
                "kind": "lead_expired_unclaimed",
                "leadId": lead.id,
                "contactName": lead.contact_name,
                "expiredAt": lead.expires_at,
            }))
            .send()
            .await
            .map_err(|e| LeadError::Notify(format!("escalation request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LeadError::Notify(format!(
                "escalation endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Periodically expires pending leads whose deadline has passed.
///
/// Uses the same conditional transition as the claim resolver, so a sweep and
/// a last-instant claim race safely: exactly one of the two writes applies.
/// Safe to run on multiple instances concurrently, and tolerant of being
/// late; a delayed sweep only delays the expired transition, it can never
/// retroactively un-assign a lead.
pub struct ExpirySweeper {
    leads: Arc<dyn LeadRepository>,
    escalation: Option<Arc<dyn EscalationSink>>,
    sweep_interval: Duration,
    batch_limit: i64,
}

impl fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirySweeper")
            .field("sweep_interval", &self.sweep_interval)
            .field("batch_limit", &self.batch_limit)
            .finish_non_exhaustive()
    }
}

impl ExpirySweeper {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        escalation: Option<Arc<dyn EscalationSink>>,
        claim: &ClaimConfig,
    ) -> Self {
        Self {
            leads,
            escalation,
            sweep_interval: claim.sweep_interval(),
            batch_limit: claim.sweep_batch_limit,
        }
    }

    /// One sweep pass. Returns the number of leads transitioned to expired;
    /// leads claimed between the scan and the write are skipped as no-ops.
    pub async fn sweep_once(&self) -> Result<u64> {
        let now = Utc::now();
        let stale = self.leads.list_expired_pending(now, self.batch_limit).await?;

        let mut expired = 0u64;
        for lead in stale {
            match self
                .leads
                .try_transition(lead.id, LeadStatus::Pending, LeadTransition::Expire)
                .await
            {
                Ok(true) => {
                    expired += 1;
                    info!("lead {} expired unclaimed", lead.id);
                    if let Some(sink) = &self.escalation {
                        if let Err(e) = sink.lead_expired(&lead).await {
                            warn!("escalation for lead {} failed: {e}", lead.id);
                        }
                    }
                }
                Ok(false) => {
                    // A claim won the race between scan and write.
                    debug!("lead {} settled before the sweep reached it", lead.id);
                }
                Err(e) => {
                    // Isolated: keep sweeping the rest of the batch.
                    warn!("sweep transition for lead {} failed: {e}", lead.id);
                }
            }
        }

        Ok(expired)
    }

    /// Run sweeps on a fixed interval until the shutdown channel closes or
    /// receives a message.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            "expiry sweeper started, interval {:?}",
            self.sweep_interval
        );
        let mut ticker = interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => {}
                        Ok(expired) => debug!("sweep pass expired {expired} leads"),
                        Err(e) => warn!("sweep pass failed: {e}"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("expiry sweeper shutting down");
                    return;
                }
            }
        }
    }
}
