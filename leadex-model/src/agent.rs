use chrono::{DateTime, Utc};

use crate::ids::AgentId;

/// A sales agent eligible to receive and claim leads.
///
/// The availability flag is agent-controlled and read as an eventually
/// consistent snapshot at fanout time. It never constrains whether a claim
/// is accepted.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub notification_address: String,
    pub available: bool,
    pub last_seen_at: DateTime<Utc>,
}
