use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::{AgentId, ClaimAttemptId, LeadId};

/// Result of a single claim attempt.
///
/// Losing a race or claiming past the deadline is an expected outcome, not
/// an error. At most one attempt per lead may ever carry `Won`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ClaimOutcome {
    Won,
    LostAlreadyClaimed,
    LostExpired,
}

impl ClaimOutcome {
    /// Storage representation, lowercase to match the column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Won => "won",
            ClaimOutcome::LostAlreadyClaimed => "lost_already_claimed",
            ClaimOutcome::LostExpired => "lost_expired",
        }
    }
}

impl FromStr for ClaimOutcome {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "won" => Ok(ClaimOutcome::Won),
            "lost_already_claimed" => Ok(ClaimOutcome::LostAlreadyClaimed),
            "lost_expired" => Ok(ClaimOutcome::LostExpired),
            other => Err(ModelError::UnknownClaimOutcome(other.to_string())),
        }
    }
}

impl std::fmt::Display for ClaimOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record of one claim attempt against one lead.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ClaimAttempt {
    pub id: ClaimAttemptId,
    pub lead_id: LeadId,
    pub agent_id: AgentId,
    pub received_at: DateTime<Utc>,
    pub outcome: ClaimOutcome,
    pub recorded_at: DateTime<Utc>,
}
