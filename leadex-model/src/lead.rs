use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::{AgentId, LeadId};

/// Lifecycle state of a lead.
///
/// `Pending` is the only non-terminal state. The other three are terminal:
/// once a lead is assumed, expired, or rejected it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum LeadStatus {
    Pending,
    Assumed,
    Expired,
    Rejected,
}

impl LeadStatus {
    /// Storage representation. Kept lowercase to match the column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Assumed => "assumed",
            LeadStatus::Expired => "expired",
            LeadStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeadStatus::Pending)
    }
}

impl FromStr for LeadStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeadStatus::Pending),
            "assumed" => Ok(LeadStatus::Assumed),
            "expired" => Ok(LeadStatus::Expired),
            "rejected" => Ok(LeadStatus::Rejected),
            other => Err(ModelError::UnknownLeadStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prospective-customer inquiry awaiting assignment to exactly one agent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Lead {
    pub id: LeadId,
    pub contact_name: String,
    pub contact_address: String,
    pub message: String,
    pub suggested_reply: Option<String>,
    pub status: LeadStatus,
    /// Deduplication key derived from the originating message. Unique per lead.
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    /// Claim deadline. Immutable once set; sweeping never postpones it.
    pub expires_at: DateTime<Utc>,
    pub assumed_by: Option<AgentId>,
    pub assumed_at: Option<DateTime<Utc>>,
    /// Opaque optimistic-concurrency token, bumped by every transition.
    pub version: i32,
}

impl Lead {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a claim received at `at` is within the deadline. This is
    /// checked against `expires_at` directly, independent of whether a sweep
    /// has already marked the lead expired.
    pub fn is_claimable_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            LeadStatus::Pending,
            LeadStatus::Assumed,
            LeadStatus::Expired,
            LeadStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("claimed".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!LeadStatus::Pending.is_terminal());
        assert!(LeadStatus::Assumed.is_terminal());
        assert!(LeadStatus::Expired.is_terminal());
        assert!(LeadStatus::Rejected.is_terminal());
    }
}
