//! Intake idempotency, fanout-once semantics, administrative rejection, and
//! escalation of unclaimed expiries.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use leadex_core::error::{LeadError, Result};
use leadex_core::fanout::FanoutNotifier;
use leadex_core::intake::{IncomingLead, LeadIntakeService};
use leadex_core::resolver::{ClaimRequest, ClaimResolver};
use leadex_core::store::ports::{
    CreatedLead, LeadRepository, LeadTransition, NewLead,
};
use leadex_core::store::MemoryLeadStore;
use leadex_core::sweeper::{EscalationSink, ExpirySweeper};
use leadex_core::{ClaimConfig, NotifyConfig};
use leadex_model::{AgentId, ClaimOutcome, Lead, LeadId, LeadStatus};

use support::{CountingMessenger, available_agent, eventually, pending_lead};

fn intake(
    store: &Arc<MemoryLeadStore>,
    messenger: &Arc<CountingMessenger>,
) -> LeadIntakeService {
    let fanout = Arc::new(FanoutNotifier::new(
        store.clone(),
        messenger.clone(),
        NotifyConfig::default(),
    ));
    LeadIntakeService::new(store.clone(), fanout, &ClaimConfig::default())
}

fn incoming(key: &str) -> IncomingLead {
    IncomingLead {
        contact_name: "Maria Silva".into(),
        contact_address: "+5511999990000".into(),
        message: "Interested in the two-bedroom listing".into(),
        suggested_reply: Some("Thanks for reaching out!".into()),
        idempotency_key: key.into(),
    }
}

#[tokio::test]
async fn duplicate_intake_returns_the_same_lead_and_fans_out_once() {
    let store = Arc::new(MemoryLeadStore::new());
    available_agent(&store, "ana").await;
    available_agent(&store, "bruno").await;

    let messenger = Arc::new(CountingMessenger::new());
    let intake = intake(&store, &messenger);

    let first = intake.submit(incoming("msg-1")).await.unwrap();
    assert!(first.created);

    eventually(|| messenger.sent() == 2, "initial fanout to both agents").await;

    let replay = intake.submit(incoming("msg-1")).await.unwrap();
    assert!(!replay.created);
    assert_eq!(replay.lead_id, first.lead_id);

    // Give a would-be second fanout a chance to fire, then confirm it never
    // did.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(messenger.sent(), 2, "a replayed intake must not re-invite");
}

#[tokio::test]
async fn distinct_keys_create_distinct_leads() {
    let store = Arc::new(MemoryLeadStore::new());
    let messenger = Arc::new(CountingMessenger::new());
    let intake = intake(&store, &messenger);

    let first = intake.submit(incoming("msg-1")).await.unwrap();
    let second = intake.submit(incoming("msg-2")).await.unwrap();
    assert_ne!(first.lead_id, second.lead_id);
    assert!(second.created);
}

#[tokio::test]
async fn intake_sets_the_claim_deadline_from_the_ttl() {
    let store = Arc::new(MemoryLeadStore::new());
    let messenger = Arc::new(CountingMessenger::new());
    let intake =
        intake(&store, &messenger).with_claim_ttl(Duration::seconds(60));

    let before = Utc::now();
    let receipt = intake.submit(incoming("msg-1")).await.unwrap();
    let after = Utc::now();

    let lead = LeadRepository::get(store.as_ref(), receipt.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert!(lead.expires_at >= before + Duration::seconds(60));
    assert!(lead.expires_at <= after + Duration::seconds(60));
    assert_eq!(lead.status, LeadStatus::Pending);
}

#[tokio::test]
async fn invalid_payloads_never_reach_storage() {
    let store = Arc::new(MemoryLeadStore::new());
    let messenger = Arc::new(CountingMessenger::new());
    let intake = intake(&store, &messenger);

    let mut bad = incoming("msg-1");
    bad.message = "".into();

    let result = intake.submit(bad).await;
    assert!(matches!(result, Err(LeadError::Validation(_))));
    assert_eq!(messenger.sent(), 0);
}

/// Lead repository that refuses every call, standing in for an unavailable
/// database.
#[derive(Debug)]
struct UnavailableLeadStore;

#[async_trait]
impl LeadRepository for UnavailableLeadStore {
    async fn create(&self, _lead: NewLead) -> Result<CreatedLead> {
        Err(LeadError::Storage("connection refused".into()))
    }

    async fn get(&self, _id: LeadId) -> Result<Option<Lead>> {
        Err(LeadError::Storage("connection refused".into()))
    }

    async fn try_transition(
        &self,
        _id: LeadId,
        _expected: LeadStatus,
        _transition: LeadTransition,
    ) -> Result<bool> {
        Err(LeadError::Storage("connection refused".into()))
    }

    async fn list_expired_pending(
        &self,
        _now: DateTime<Utc>,
        _limit: i64,
    ) -> Result<Vec<Lead>> {
        Err(LeadError::Storage("connection refused".into()))
    }
}

#[tokio::test]
async fn intake_fails_closed_when_storage_is_down() {
    let agents = Arc::new(MemoryLeadStore::new());
    let messenger = Arc::new(CountingMessenger::new());
    let fanout = Arc::new(FanoutNotifier::new(
        agents,
        messenger.clone(),
        NotifyConfig::default(),
    ));
    let intake = LeadIntakeService::new(
        Arc::new(UnavailableLeadStore),
        fanout,
        &ClaimConfig::default(),
    );

    let result = intake.submit(incoming("msg-1")).await;
    assert!(matches!(result, Err(LeadError::Storage(_))));
    assert_eq!(messenger.sent(), 0, "no fanout for a lead that was not stored");
}

#[tokio::test]
async fn administrative_rejection_closes_a_pending_lead() {
    let store = Arc::new(MemoryLeadStore::new());
    let lead = pending_lead(&store, "msg-1", Utc::now() + Duration::minutes(15)).await;

    let rejected = LeadRepository::try_transition(
        store.as_ref(),
        lead.id,
        LeadStatus::Pending,
        LeadTransition::Reject,
    )
    .await
    .unwrap();
    assert!(rejected);

    let stored = LeadRepository::get(store.as_ref(), lead.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LeadStatus::Rejected);

    // A claim against the rejected lead is closed out, not granted.
    let resolver = ClaimResolver::new(store.clone(), store.clone());
    let resolution = resolver
        .resolve(ClaimRequest {
            lead_id: lead.id,
            agent_id: AgentId::new(),
            received_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(resolution.outcome, ClaimOutcome::LostExpired);
}

#[tokio::test]
async fn rejection_of_an_assumed_lead_is_a_no_op() {
    let store = Arc::new(MemoryLeadStore::new());
    let lead = pending_lead(&store, "msg-1", Utc::now() + Duration::minutes(15)).await;
    let winner = AgentId::new();

    let resolver = ClaimResolver::new(store.clone(), store.clone());
    resolver
        .resolve(ClaimRequest {
            lead_id: lead.id,
            agent_id: winner,
            received_at: Utc::now(),
        })
        .await
        .unwrap();

    let rejected = LeadRepository::try_transition(
        store.as_ref(),
        lead.id,
        LeadStatus::Pending,
        LeadTransition::Reject,
    )
    .await
    .unwrap();
    assert!(!rejected);

    let stored = LeadRepository::get(store.as_ref(), lead.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LeadStatus::Assumed);
    assert_eq!(stored.assumed_by, Some(winner));
}

/// Escalation sink that records which leads it was told about.
#[derive(Debug, Default)]
struct RecordingSink {
    signals: AtomicUsize,
}

#[async_trait]
impl EscalationSink for RecordingSink {
    async fn lead_expired(&self, _lead: &Lead) -> Result<()> {
        self.signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that always fails, to prove escalation stays best-effort.
#[derive(Debug)]
struct BrokenSink;

#[async_trait]
impl EscalationSink for BrokenSink {
    async fn lead_expired(&self, _lead: &Lead) -> Result<()> {
        Err(LeadError::Notify("supervisory queue unreachable".into()))
    }
}

#[tokio::test]
async fn unclaimed_expiries_are_escalated() {
    let store = Arc::new(MemoryLeadStore::new());
    pending_lead(&store, "msg-1", Utc::now() - Duration::seconds(10)).await;
    pending_lead(&store, "msg-2", Utc::now() - Duration::seconds(5)).await;

    let sink = Arc::new(RecordingSink::default());
    let sweeper = ExpirySweeper::new(store.clone(), Some(sink.clone()), &ClaimConfig::default());

    let expired = sweeper.sweep_once().await.unwrap();
    assert_eq!(expired, 2);
    assert_eq!(sink.signals.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn escalation_failures_do_not_stop_the_sweep() {
    let store = Arc::new(MemoryLeadStore::new());
    let lead = pending_lead(&store, "msg-1", Utc::now() - Duration::seconds(10)).await;

    let sweeper = ExpirySweeper::new(store.clone(), Some(Arc::new(BrokenSink)), &ClaimConfig::default());
    let expired = sweeper.sweep_once().await.unwrap();
    assert_eq!(expired, 1);

    let stored = LeadRepository::get(store.as_ref(), lead.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LeadStatus::Expired);
}
