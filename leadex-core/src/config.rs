use serde::{Deserialize, Serialize};

/// Global knobs that tune lead distribution behaviour.
///
/// All fields carry defaults so existing deployments can progressively adopt
/// new settings without supplying a full configuration payload.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DistributionConfig {
    /// Claim window and sweep cadence.
    pub claim: ClaimConfig,
    /// Outbound notification retry/backoff policy and fanout behaviour.
    pub notify: NotifyConfig,
}

/// Claim-window tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// How long a lead stays claimable after intake (seconds).
    pub ttl_secs: i64,
    /// Cadence of the expiry sweeper (seconds). The sweeper tolerates being
    /// late; a delayed sweep only delays the expired transition.
    pub sweep_interval_secs: u64,
    /// Maximum leads transitioned per sweep pass.
    pub sweep_batch_limit: i64,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 900,
            sweep_interval_secs: 30,
            sweep_batch_limit: 200,
        }
    }
}

impl ClaimConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Fanout/notification tuning shared by all invitation sends.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Maximum delivery attempts per agent, including the first.
    pub max_attempts: u16,
    /// Base delay for exponential backoff between attempts (ms).
    pub backoff_base_ms: u64,
    /// Cap applied to the backoff delay (ms).
    pub backoff_max_ms: u64,
    /// Keyword an agent replies with to claim a lead. Included in every
    /// invitation so the external channel can route the reply.
    pub claim_keyword: String,
    /// Whether agents that lose a claim race are actively told so.
    pub loser_policy: LoserNotificationPolicy,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 15_000,
            claim_keyword: "CLAIM".to_string(),
            loser_policy: LoserNotificationPolicy::Silent,
        }
    }
}

/// Policy for agents on the losing side of a claim race.
///
/// The upstream product never settled this, so it stays a deployment choice:
/// `Silent` sends losers nothing further, `Notify` sends a best-effort
/// already-claimed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoserNotificationPolicy {
    #[default]
    Silent,
    Notify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_field() {
        let config: DistributionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.claim.ttl_secs, 900);
        assert_eq!(config.claim.sweep_interval_secs, 30);
        assert_eq!(config.notify.max_attempts, 3);
        assert_eq!(config.notify.loser_policy, LoserNotificationPolicy::Silent);
    }

    #[test]
    fn partial_payload_overrides_only_named_knobs() {
        let config: DistributionConfig =
            serde_json::from_str(r#"{"claim":{"ttl_secs":60}}"#).unwrap();
        assert_eq!(config.claim.ttl_secs, 60);
        assert_eq!(config.claim.sweep_batch_limit, 200);
    }
}
