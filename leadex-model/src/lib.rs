//! Core data model definitions shared across Leadex crates.
#![allow(missing_docs)]

pub mod agent;
pub mod claim;
pub mod error;
pub mod ids;
pub mod lead;

// Intentionally curated re-exports for downstream consumers.
pub use agent::Agent;
pub use claim::{ClaimAttempt, ClaimOutcome};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AgentId, ClaimAttemptId, LeadId};
pub use lead::{Lead, LeadStatus};
