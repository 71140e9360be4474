//! End-to-end tests of the HTTP surface over the in-memory store: intake
//! idempotency, claim outcomes, admin rejection, and agent self-service.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};

use leadex_core::config::DistributionConfig;
use leadex_server::{AppState, Config, routes};

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_config(ttl_secs: i64) -> Config {
    let mut distribution = DistributionConfig::default();
    distribution.claim.ttl_secs = ttl_secs;

    Config {
        server_host: "127.0.0.1".into(),
        server_port: 0,
        database_url: None,
        cors_allowed_origins: vec!["*".into()],
        admin_token: Some(ADMIN_TOKEN.into()),
        notifier_endpoint: None,
        escalation_endpoint: None,
        distribution,
    }
}

fn test_server(ttl_secs: i64) -> TestServer {
    let state = AppState::in_memory(Arc::new(test_config(ttl_secs))).expect("state");
    TestServer::new(routes::create_router(state)).expect("test server")
}

fn lead_payload(key: &str) -> Value {
    json!({
        "contactName": "Maria Silva",
        "contactAddress": "+5511999990000",
        "message": "Interested in the two-bedroom listing",
        "idempotencyKey": key,
    })
}

fn admin_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-admin-token"),
        HeaderValue::from_static(ADMIN_TOKEN),
    )
}

#[tokio::test]
async fn lead_creation_is_idempotent_per_key() {
    let server = test_server(900);

    let first = server.post("/api/v1/leads").json(&lead_payload("msg-1")).await;
    first.assert_status(StatusCode::CREATED);
    let first_body: Value = first.json();

    let replay = server.post("/api/v1/leads").json(&lead_payload("msg-1")).await;
    replay.assert_status(StatusCode::OK);
    let replay_body: Value = replay.json();

    assert_eq!(first_body["leadId"], replay_body["leadId"]);
}

#[tokio::test]
async fn unknown_fields_are_rejected_at_the_boundary() {
    let server = test_server(900);

    let response = server
        .post("/api/v1/leads")
        .json(&json!({
            "contactName": "Maria",
            "contactAddress": "+55119",
            "message": "hi",
            "idempotencyKey": "msg-1",
            "priority": "extreme",
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn blank_payload_fields_are_rejected() {
    let server = test_server(900);

    let response = server
        .post("/api/v1/leads")
        .json(&json!({
            "contactName": "",
            "contactAddress": "+55119",
            "message": "hi",
            "idempotencyKey": "msg-1",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn first_claim_wins_and_later_claims_are_told_so() {
    let server = test_server(900);

    let created = server.post("/api/v1/leads").json(&lead_payload("msg-1")).await;
    let lead_id = created.json::<Value>()["leadId"].as_str().unwrap().to_string();

    let agent1 = uuid::Uuid::now_v7();
    let agent2 = uuid::Uuid::now_v7();

    let won = server
        .post(&format!("/api/v1/leads/{lead_id}/claims"))
        .json(&json!({ "agentId": agent1 }))
        .await;
    won.assert_status_ok();
    assert_eq!(won.json::<Value>()["outcome"], "WON");

    let lost = server
        .post(&format!("/api/v1/leads/{lead_id}/claims"))
        .json(&json!({ "agentId": agent2 }))
        .await;
    lost.assert_status_ok();
    assert_eq!(lost.json::<Value>()["outcome"], "LOST_ALREADY_CLAIMED");

    // The winner repeating its claim stays WON.
    let replay = server
        .post(&format!("/api/v1/leads/{lead_id}/claims"))
        .json(&json!({ "agentId": agent1 }))
        .await;
    assert_eq!(replay.json::<Value>()["outcome"], "WON");

    // The lead snapshot reflects the award.
    let lead = server.get(&format!("/api/v1/leads/{lead_id}")).await;
    lead.assert_status_ok();
    let lead_body: Value = lead.json();
    assert_eq!(lead_body["status"], "ASSUMED");
    assert_eq!(lead_body["assumedBy"], agent1.to_string());

    // All three attempts are in the audit trail.
    let audit = server.get(&format!("/api/v1/leads/{lead_id}/claims")).await;
    audit.assert_status_ok();
    assert_eq!(audit.json::<Value>().as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn claims_past_the_deadline_lose_as_expired() {
    // TTL of zero: the lead expires the instant it is created.
    let server = test_server(0);

    let created = server.post("/api/v1/leads").json(&lead_payload("msg-1")).await;
    let lead_id = created.json::<Value>()["leadId"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/v1/leads/{lead_id}/claims"))
        .json(&json!({ "agentId": uuid::Uuid::now_v7() }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["outcome"], "LOST_EXPIRED");
}

#[tokio::test]
async fn claiming_an_unknown_lead_is_404() {
    let server = test_server(900);
    let response = server
        .post(&format!("/api/v1/leads/{}/claims", uuid::Uuid::now_v7()))
        .json(&json!({ "agentId": uuid::Uuid::now_v7() }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejection_requires_the_admin_token() {
    let server = test_server(900);

    let created = server.post("/api/v1/leads").json(&lead_payload("msg-1")).await;
    let lead_id = created.json::<Value>()["leadId"].as_str().unwrap().to_string();

    let unauthorized = server
        .post(&format!("/api/v1/leads/{lead_id}/reject"))
        .await;
    unauthorized.assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = admin_header();
    let rejected = server
        .post(&format!("/api/v1/leads/{lead_id}/reject"))
        .add_header(name.clone(), value.clone())
        .await;
    rejected.assert_status(StatusCode::NO_CONTENT);

    // A second rejection finds the lead already settled.
    let conflict = server
        .post(&format!("/api/v1/leads/{lead_id}/reject"))
        .add_header(name, value)
        .await;
    conflict.assert_status(StatusCode::CONFLICT);

    // Claims against the rejected lead are closed out.
    let claim = server
        .post(&format!("/api/v1/leads/{lead_id}/claims"))
        .json(&json!({ "agentId": uuid::Uuid::now_v7() }))
        .await;
    assert_eq!(claim.json::<Value>()["outcome"], "LOST_EXPIRED");
}

#[tokio::test]
async fn agents_manage_their_own_availability() {
    let server = test_server(900);

    let registered = server
        .post("/api/v1/agents")
        .json(&json!({
            "displayName": "Ana",
            "notificationAddress": "+5511988880000",
        }))
        .await;
    registered.assert_status(StatusCode::CREATED);
    let agent: Value = registered.json();
    assert_eq!(agent["available"], false);
    let agent_id = agent["id"].as_str().unwrap().to_string();

    let toggled = server
        .patch(&format!("/api/v1/agents/{agent_id}"))
        .json(&json!({ "available": true }))
        .await;
    toggled.assert_status_ok();
    assert_eq!(toggled.json::<Value>()["available"], true);

    let fetched = server.get(&format!("/api/v1/agents/{agent_id}")).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["available"], true);

    let empty = server
        .patch(&format!("/api/v1/agents/{agent_id}"))
        .json(&json!({}))
        .await;
    empty.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_ok_without_a_pool() {
    let server = test_server(900);
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}
