//! Shared helpers for the lead-distribution test suite.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use leadex_core::error::Result;
use leadex_core::fanout::{Messenger, OutboundMessage};
use leadex_core::store::{
    AgentRepository, AgentUpdate, LeadRepository, MemoryLeadStore, NewAgent, NewLead,
};
use leadex_model::{Agent, Lead};

/// Messenger that records sends and always succeeds.
#[derive(Debug, Default)]
pub struct CountingMessenger {
    sends: AtomicUsize,
}

impl CountingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for CountingMessenger {
    async fn send(&self, _address: &str, _message: &OutboundMessage) -> Result<()> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Seed one pending lead with an explicit deadline.
pub async fn pending_lead(
    store: &MemoryLeadStore,
    idempotency_key: &str,
    expires_at: DateTime<Utc>,
) -> Lead {
    LeadRepository::create(
        store,
        NewLead {
            contact_name: "Maria Silva".into(),
            contact_address: "+5511999990000".into(),
            message: "Interested in the two-bedroom listing on Rua Augusta".into(),
            suggested_reply: None,
            idempotency_key: idempotency_key.into(),
            expires_at,
        },
    )
    .await
    .expect("seed lead")
    .lead
}

/// Seed one agent and flip it available.
pub async fn available_agent(store: &MemoryLeadStore, name: &str) -> Agent {
    let agent = AgentRepository::insert(
        store,
        NewAgent {
            display_name: name.into(),
            notification_address: format!("+55-{name}"),
        },
    )
    .await
    .expect("seed agent");

    AgentRepository::update(
        store,
        agent.id,
        AgentUpdate {
            available: Some(true),
            notification_address: None,
        },
        Utc::now(),
    )
    .await
    .expect("mark agent available")
}

/// Await a condition that a detached task will satisfy shortly.
pub async fn eventually<F>(mut check: F, description: &str)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {description}");
}
