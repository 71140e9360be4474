use std::env;

use anyhow::Context;
use leadex_core::config::{DistributionConfig, LoserNotificationPolicy};
use serde::Deserialize;

/// Server configuration loaded via environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Database settings
    pub database_url: Option<String>,

    // CORS settings
    pub cors_allowed_origins: Vec<String>,

    /// Shared secret for administrative actions (lead rejection). Admin
    /// routes refuse all requests when unset.
    pub admin_token: Option<String>,

    /// Send API of the external messaging provider. Invitations are only
    /// logged when unset.
    pub notifier_endpoint: Option<String>,

    /// Supervisory endpoint for unclaimed-expiry escalations.
    pub escalation_endpoint: Option<String>,

    /// Claim window, sweep cadence, and notification policy.
    #[serde(default)]
    pub distribution: DistributionConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let distribution = distribution_from_env()?;

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            database_url: env::var("DATABASE_URL").ok(),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),

            admin_token: env::var("ADMIN_TOKEN").ok(),
            notifier_endpoint: env::var("NOTIFIER_ENDPOINT").ok(),
            escalation_endpoint: env::var("ESCALATION_ENDPOINT").ok(),

            distribution,
        })
    }
}

/// Distribution overrides. Evaluation order:
/// 1) `$DISTRIBUTION_CONFIG_JSON` (inline JSON for the full config),
/// 2) individual `LEAD_TTL_SECS` / `SWEEP_INTERVAL_SECS` / `CLAIM_KEYWORD` /
///    `LOSER_NOTIFICATION` variables over the defaults.
fn distribution_from_env() -> anyhow::Result<DistributionConfig> {
    if let Ok(raw) = env::var("DISTRIBUTION_CONFIG_JSON") {
        return serde_json::from_str(&raw).context("failed to parse DISTRIBUTION_CONFIG_JSON");
    }

    let mut distribution = DistributionConfig::default();

    if let Ok(raw) = env::var("LEAD_TTL_SECS") {
        distribution.claim.ttl_secs = raw
            .parse()
            .with_context(|| format!("invalid LEAD_TTL_SECS: {raw}"))?;
    }
    if let Ok(raw) = env::var("SWEEP_INTERVAL_SECS") {
        distribution.claim.sweep_interval_secs = raw
            .parse()
            .with_context(|| format!("invalid SWEEP_INTERVAL_SECS: {raw}"))?;
    }
    if let Ok(keyword) = env::var("CLAIM_KEYWORD") {
        distribution.notify.claim_keyword = keyword;
    }
    if let Ok(raw) = env::var("LOSER_NOTIFICATION") {
        distribution.notify.loser_policy = match raw.as_str() {
            "silent" => LoserNotificationPolicy::Silent,
            "notify" => LoserNotificationPolicy::Notify,
            other => anyhow::bail!("invalid LOSER_NOTIFICATION: {other} (silent|notify)"),
        };
    }

    Ok(distribution)
}
