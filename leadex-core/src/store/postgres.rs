use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use leadex_model::{Agent, AgentId, ClaimAttempt, ClaimAttemptId, Lead, LeadId, LeadStatus};

use crate::error::{LeadError, Result};
use crate::store::ports::{
    AgentRepository, AgentUpdate, ClaimAuditRepository, CreatedLead, LeadRepository,
    LeadTransition, NewAgent, NewClaimAttempt, NewLead,
};

const LEAD_COLUMNS: &str = "id, contact_name, contact_address, message, suggested_reply, \
     status, idempotency_key, created_at, expires_at, assumed_by, assumed_at, version";

#[derive(Debug, sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    contact_name: String,
    contact_address: String,
    message: String,
    suggested_reply: Option<String>,
    status: String,
    idempotency_key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    assumed_by: Option<Uuid>,
    assumed_at: Option<DateTime<Utc>>,
    version: i32,
}

fn map_lead_row(row: LeadRow) -> Result<Lead> {
    let status: LeadStatus = row.status.parse().map_err(|_| {
        LeadError::Storage(format!(
            "lead {} has unrecognized status {}",
            row.id, row.status
        ))
    })?;

    Ok(Lead {
        id: LeadId(row.id),
        contact_name: row.contact_name,
        contact_address: row.contact_address,
        message: row.message,
        suggested_reply: row.suggested_reply,
        status,
        idempotency_key: row.idempotency_key,
        created_at: row.created_at,
        expires_at: row.expires_at,
        assumed_by: row.assumed_by.map(AgentId),
        assumed_at: row.assumed_at,
        version: row.version,
    })
}

/// Postgres-backed lead store. The conditional update in `try_transition` is
/// the single winner-deciding write of the whole subsystem.
#[derive(Debug, Clone)]
pub struct PostgresLeadRepository {
    pool: PgPool,
}

impl PostgresLeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("lead lookup by idempotency key failed: {e}")))?;

        row.map(map_lead_row).transpose()
    }
}

#[async_trait]
impl LeadRepository for PostgresLeadRepository {
    async fn create(&self, lead: NewLead) -> Result<CreatedLead> {
        let id = LeadId::new();

        let insert = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO leads (
                id, contact_name, contact_address, message, suggested_reply,
                status, idempotency_key, created_at, expires_at, version
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, NOW(), $7, 0)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id.to_uuid())
        .bind(&lead.contact_name)
        .bind(&lead.contact_address)
        .bind(&lead.message)
        .bind(lead.suggested_reply.as_deref())
        .bind(&lead.idempotency_key)
        .bind(lead.expires_at)
        .fetch_one(self.pool())
        .await;

        match insert {
            Ok(row) => Ok(CreatedLead {
                lead: map_lead_row(row)?,
                created: true,
            }),
            Err(sqlx::Error::Database(db_err)) => {
                // Unique violation on the idempotency key => this lead was
                // already ingested; hand back the existing record.
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    let existing =
                        self.get_by_idempotency_key(&lead.idempotency_key)
                            .await?
                            .ok_or_else(|| {
                                LeadError::Storage(
                                    "lead insert conflicted but no existing row found".into(),
                                )
                            })?;
                    Ok(CreatedLead {
                        lead: existing,
                        created: false,
                    })
                } else {
                    Err(LeadError::Storage(format!("lead insert failed: {db_err}")))
                }
            }
            Err(e) => Err(LeadError::Storage(format!("lead insert failed: {e}"))),
        }
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"
        ))
        .bind(id.to_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("lead lookup failed: {e}")))?;

        row.map(map_lead_row).transpose()
    }

    async fn try_transition(
        &self,
        id: LeadId,
        expected: LeadStatus,
        transition: LeadTransition,
    ) -> Result<bool> {
        // A single conditional UPDATE keyed on the current status. Concurrent
        // callers race on the row; Postgres serializes the writes and exactly
        // one sees its expected status still in place.
        let result = match transition {
            LeadTransition::Assume { agent_id, at } => sqlx::query(
                r#"
                UPDATE leads
                SET status = 'assumed',
                    assumed_by = $3,
                    assumed_at = $4,
                    version = version + 1
                WHERE id = $1 AND status = $2
                "#,
            )
            .bind(id.to_uuid())
            .bind(expected.as_str())
            .bind(agent_id.to_uuid())
            .bind(at)
            .execute(self.pool())
            .await,
            LeadTransition::Expire => sqlx::query(
                r#"
                UPDATE leads
                SET status = 'expired',
                    version = version + 1
                WHERE id = $1 AND status = $2
                "#,
            )
            .bind(id.to_uuid())
            .bind(expected.as_str())
            .execute(self.pool())
            .await,
            LeadTransition::Reject => sqlx::query(
                r#"
                UPDATE leads
                SET status = 'rejected',
                    version = version + 1
                WHERE id = $1 AND status = $2
                "#,
            )
            .bind(id.to_uuid())
            .bind(expected.as_str())
            .execute(self.pool())
            .await,
        };

        let result =
            result.map_err(|e| LeadError::Storage(format!("lead transition failed: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>> {
        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            SELECT {LEAD_COLUMNS}
            FROM leads
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("expired lead scan failed: {e}")))?;

        rows.into_iter().map(map_lead_row).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    display_name: String,
    notification_address: String,
    available: bool,
    last_seen_at: DateTime<Utc>,
}

fn map_agent_row(row: AgentRow) -> Agent {
    Agent {
        id: AgentId(row.id),
        display_name: row.display_name,
        notification_address: row.notification_address,
        available: row.available,
        last_seen_at: row.last_seen_at,
    }
}

#[derive(Debug, Clone)]
pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn insert(&self, agent: NewAgent) -> Result<Agent> {
        let id = AgentId::new();
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            INSERT INTO agents (id, display_name, notification_address, available, last_seen_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            RETURNING id, display_name, notification_address, available, last_seen_at
            "#,
        )
        .bind(id.to_uuid())
        .bind(&agent.display_name)
        .bind(&agent.notification_address)
        .fetch_one(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("agent insert failed: {e}")))?;

        Ok(map_agent_row(row))
    }

    async fn get(&self, id: AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, display_name, notification_address, available, last_seen_at
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("agent lookup failed: {e}")))?;

        Ok(row.map(map_agent_row))
    }

    async fn update(&self, id: AgentId, update: AgentUpdate, now: DateTime<Utc>) -> Result<Agent> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            UPDATE agents
            SET available = COALESCE($2, available),
                notification_address = COALESCE($3, notification_address),
                last_seen_at = $4
            WHERE id = $1
            RETURNING id, display_name, notification_address, available, last_seen_at
            "#,
        )
        .bind(id.to_uuid())
        .bind(update.available)
        .bind(update.notification_address.as_deref())
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("agent update failed: {e}")))?;

        row.map(map_agent_row)
            .ok_or_else(|| LeadError::NotFound(format!("agent {id}")))
    }

    async fn list_available(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, display_name, notification_address, available, last_seen_at
            FROM agents
            WHERE available
            ORDER BY display_name ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("available agent scan failed: {e}")))?;

        Ok(rows.into_iter().map(map_agent_row).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimAttemptRow {
    id: Uuid,
    lead_id: Uuid,
    agent_id: Uuid,
    received_at: DateTime<Utc>,
    outcome: String,
    recorded_at: DateTime<Utc>,
}

fn map_attempt_row(row: ClaimAttemptRow) -> Result<ClaimAttempt> {
    let outcome = row.outcome.parse().map_err(|_| {
        LeadError::Storage(format!(
            "claim attempt {} has unrecognized outcome {}",
            row.id, row.outcome
        ))
    })?;

    Ok(ClaimAttempt {
        id: ClaimAttemptId(row.id),
        lead_id: LeadId(row.lead_id),
        agent_id: AgentId(row.agent_id),
        received_at: row.received_at,
        outcome,
        recorded_at: row.recorded_at,
    })
}

#[derive(Debug, Clone)]
pub struct PostgresClaimAuditRepository {
    pool: PgPool,
}

impl PostgresClaimAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ClaimAuditRepository for PostgresClaimAuditRepository {
    async fn record(&self, attempt: NewClaimAttempt) -> Result<ClaimAttempt> {
        let id = ClaimAttemptId::new();
        let row = sqlx::query_as::<_, ClaimAttemptRow>(
            r#"
            INSERT INTO claim_attempts (id, lead_id, agent_id, received_at, outcome, recorded_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, lead_id, agent_id, received_at, outcome, recorded_at
            "#,
        )
        .bind(id.to_uuid())
        .bind(attempt.lead_id.to_uuid())
        .bind(attempt.agent_id.to_uuid())
        .bind(attempt.received_at)
        .bind(attempt.outcome.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("claim attempt insert failed: {e}")))?;

        map_attempt_row(row)
    }

    async fn list_for_lead(&self, lead_id: LeadId) -> Result<Vec<ClaimAttempt>> {
        let rows = sqlx::query_as::<_, ClaimAttemptRow>(
            r#"
            SELECT id, lead_id, agent_id, received_at, outcome, recorded_at
            FROM claim_attempts
            WHERE lead_id = $1
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(lead_id.to_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| LeadError::Storage(format!("claim attempt scan failed: {e}")))?;

        rows.into_iter().map(map_attempt_row).collect()
    }
}
