use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// One instance as reported by the inventory collaborator. Fields the
/// dashboard does not know about stay available through `raw`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InstanceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub launch_time: Option<DateTime<Utc>>,
    // Full envelope item, kept for the detail view. Not part of the wire
    // schema; populated after deserialization.
    #[serde(skip)]
    pub raw: JsonValue,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Impaired,
    Initializing,
    #[serde(other)]
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Impaired => "impaired",
            HealthStatus::Initializing => "initializing",
            HealthStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InstanceHealth {
    pub id: String,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    #[allow(dead_code)]
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    // Command line producing the instance listing envelope
    pub instances_cmd: String,
    // Optional command line producing the health envelope; no health
    // poller is spawned without it
    #[serde(default)]
    pub health_cmd: Option<String>,
    #[serde(default = "default_status_ttl")]
    pub status_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub can_close: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            header: Some("FLEET TUI".to_string()),
            poll_interval_secs: default_poll_interval(),
            instances_cmd: "${FLEET_BIN} list-instances".to_string(),
            health_cmd: Some("${FLEET_BIN} describe-health".to_string()),
            status_ttl_secs: default_status_ttl(),
            can_close: true,
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_status_ttl() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

pub(crate) fn validate_app_config(cfg: &AppConfig) -> Result<(), String> {
    if cfg.poll_interval_secs == 0 {
        return Err("poll_interval_secs must be at least 1".to_string());
    }
    if cfg.status_ttl_secs == 0 {
        return Err("status_ttl_secs must be at least 1".to_string());
    }
    if cfg.instances_cmd.trim().is_empty() {
        return Err("instances_cmd must not be empty".to_string());
    }
    if let Some(cmd) = &cfg.health_cmd {
        if cmd.trim().is_empty() {
            return Err("health_cmd must not be empty when set".to_string());
        }
    }
    Ok(())
}
