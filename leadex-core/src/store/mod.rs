//! Durable state for leads, agents, and the claim audit trail.
//!
//! The ports in this module are the only synchronization surface of the
//! service: every winner-deciding write goes through
//! [`LeadRepository::try_transition`], which implementations must make atomic
//! per lead record. No caller layers additional locking on top of it.

pub mod memory;
pub mod ports;
pub mod postgres;

pub use memory::MemoryLeadStore;
pub use ports::{
    AgentRepository, AgentUpdate, ClaimAuditRepository, CreatedLead, LeadRepository,
    LeadTransition, NewAgent, NewClaimAttempt, NewLead,
};
pub use postgres::{PostgresAgentRepository, PostgresClaimAuditRepository, PostgresLeadRepository};
