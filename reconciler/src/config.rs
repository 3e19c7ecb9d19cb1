//! Reconciler configuration

use serde::Deserialize;

use crate::domain::types::Settings;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

/// Reconciler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interval the agent waits between full reconciliations
    #[serde(default = "default_full_reconciliation_interval_seconds")]
    pub full_reconciliation_interval_seconds: u64,

    /// Interval the agent waits between partial reconciliations
    #[serde(default = "default_partial_reconciliation_interval_seconds")]
    pub partial_reconciliation_interval_seconds: u64,

    /// Include the rendered config_to_apply in the observer's debug log.
    /// Manifests may be large, so this is off unless explicitly requested.
    #[serde(default)]
    pub observe_config_to_apply: bool,

    /// Log output format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

/// Environment toggle for logging the full config_to_apply
pub const OBSERVE_CONFIG_TO_APPLY_ENV: &str = "GITLAB_DEBUG_WORKSPACES_OBSERVE_CONFIG_TO_APPLY";

fn default_full_reconciliation_interval_seconds() -> u64 {
    3600 // 1 hour
}

fn default_partial_reconciliation_interval_seconds() -> u64 {
    10
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with default config as base
        let mut config = Config::default();

        if let Some(val) = lookup("WORKSPACES_FULL_RECONCILIATION_INTERVAL_SECONDS") {
            config.full_reconciliation_interval_seconds = val.trim().parse().map_err(|e| {
                anyhow::anyhow!("Invalid WORKSPACES_FULL_RECONCILIATION_INTERVAL_SECONDS: {}", e)
            })?;
        }
        if let Some(val) = lookup("WORKSPACES_PARTIAL_RECONCILIATION_INTERVAL_SECONDS") {
            config.partial_reconciliation_interval_seconds = val.trim().parse().map_err(|e| {
                anyhow::anyhow!(
                    "Invalid WORKSPACES_PARTIAL_RECONCILIATION_INTERVAL_SECONDS: {}",
                    e
                )
            })?;
        }
        if let Some(val) = lookup(OBSERVE_CONFIG_TO_APPLY_ENV) {
            config.observe_config_to_apply = is_truthy(&val);
        }
        if let Some(val) = lookup("WORKSPACES_LOG_FORMAT") {
            config.log_format = match val.trim() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => anyhow::bail!("Invalid WORKSPACES_LOG_FORMAT: {}", other),
            };
        }

        Ok(config)
    }

    /// Settings echoed back to the agent in every response
    pub fn settings(&self) -> Settings {
        Settings {
            full_reconciliation_interval_seconds: self.full_reconciliation_interval_seconds,
            partial_reconciliation_interval_seconds: self.partial_reconciliation_interval_seconds,
        }
    }
}

fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_reconciliation_interval_seconds: default_full_reconciliation_interval_seconds(),
            partial_reconciliation_interval_seconds:
                default_partial_reconciliation_interval_seconds(),
            observe_config_to_apply: false,
            log_format: default_log_format(),
        }
    }
}
