use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::env;
use std::process::Command;
use thiserror::Error;

use crate::model::{AppConfig, InstanceHealth, InstanceRecord};

/// Contract with the remote inventory collaborator. The poller calls both
/// operations with empty/default arguments on every tick.
pub trait InventoryClient: Send + Sync {
    fn list_instances(&self, filter: Option<&str>)
        -> Result<Vec<InstanceRecord>, InventoryError>;
    fn describe_health(&self, ids: &[String]) -> Result<Vec<InstanceHealth>, InventoryError>;
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("invalid inventory command line: {0}")]
    BadCommandLine(String),
    #[error("failed to launch inventory command: {0}")]
    Spawn(String),
    #[error("inventory command failed: {0}")]
    Command(String),
    #[error("unexpected inventory payload: {0}")]
    Payload(String),
}

fn expand_cmdline_env(cmdline: &str) -> String {
    // Expand ${VAR} from environment; special-case ${FLEET_BIN}
    // -> FLEET_TUI_BIN (quoted if it contains whitespace) or the default
    // "fleet-cli"
    let re = Regex::new(r"\$\{([A-Z0-9_]+)\}").expect("static pattern");
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        if key == "FLEET_BIN" {
            if let Some(v) = env_map.get("FLEET_TUI_BIN") {
                // Quote if it contains whitespace to keep it a single arg
                // in shlex::split
                let needs_quote = v.chars().any(|c| c.is_whitespace());
                if needs_quote {
                    let escaped = v.replace('"', "\\\"");
                    return format!("\"{escaped}\"");
                }
                return v.to_string();
            }
            return "fleet-cli".to_string();
        }
        env_map.get(key).cloned().unwrap_or_default()
    })
    .to_string()
}

fn run_cmdline_to_json(cmdline: &str) -> Result<JsonValue, InventoryError> {
    let expanded = expand_cmdline_env(cmdline);
    let parts = shlex::split(&expanded)
        .ok_or_else(|| InventoryError::BadCommandLine(expanded.clone()))?;
    if parts.is_empty() {
        return Err(InventoryError::BadCommandLine(expanded));
    }
    let program = &parts[0];
    let args = &parts[1..];
    let output = Command::new(program)
        .args(args)
        .env("FLEET_TUI_JSON", "1")
        .output()
        .map_err(|e| InventoryError::Spawn(format!("{expanded}: {e}")))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(InventoryError::Command(format!("{cmdline}\n{err}")));
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    serde_json::from_str(&text).map_err(|e| InventoryError::Payload(e.to_string()))
}

fn envelope_items<'a>(v: &'a JsonValue, keys: &[&str]) -> Option<&'a Vec<JsonValue>> {
    let data = v.get("data")?;
    keys.iter()
        .find_map(|k| data.get(k))
        .and_then(|x| x.as_array())
}

pub(crate) fn parse_instances(v: &JsonValue) -> Result<Vec<InstanceRecord>, InventoryError> {
    let items = envelope_items(v, &["instances", "items"])
        .ok_or_else(|| InventoryError::Payload("missing data.instances array".to_string()))?;
    items
        .iter()
        .map(|item| {
            let mut rec: InstanceRecord = serde_json::from_value(item.clone())
                .map_err(|e| InventoryError::Payload(e.to_string()))?;
            rec.raw = item.clone();
            Ok(rec)
        })
        .collect()
}

pub(crate) fn parse_health(v: &JsonValue) -> Result<Vec<InstanceHealth>, InventoryError> {
    let items = envelope_items(v, &["statuses", "items"])
        .ok_or_else(|| InventoryError::Payload("missing data.statuses array".to_string()))?;
    items
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|e| InventoryError::Payload(e.to_string()))
        })
        .collect()
}

/// Production client: shells out to the configured command lines and
/// parses the JSON envelope they print.
pub struct CliInventoryClient {
    instances_cmd: String,
    health_cmd: Option<String>,
}

impl CliInventoryClient {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            instances_cmd: cfg.instances_cmd.clone(),
            health_cmd: cfg.health_cmd.clone(),
        }
    }
}

impl InventoryClient for CliInventoryClient {
    fn list_instances(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<InstanceRecord>, InventoryError> {
        let mut cmdline = self.instances_cmd.clone();
        if let Some(state) = filter {
            cmdline.push_str(&format!(" --state {state}"));
        }
        let v = run_cmdline_to_json(&cmdline)?;
        parse_instances(&v)
    }

    fn describe_health(&self, ids: &[String]) -> Result<Vec<InstanceHealth>, InventoryError> {
        let Some(base) = &self.health_cmd else {
            return Ok(Vec::new());
        };
        let mut cmdline = base.clone();
        if !ids.is_empty() {
            cmdline.push_str(&format!(" --ids {}", ids.join(",")));
        }
        let v = run_cmdline_to_json(&cmdline)?;
        parse_health(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HealthStatus;
    use serde_json::json;

    #[test]
    fn expand_substitutes_fleet_bin_with_default_and_override() {
        env::remove_var("FLEET_TUI_BIN");
        assert_eq!(
            expand_cmdline_env("${FLEET_BIN} list-instances"),
            "fleet-cli list-instances"
        );
        env::set_var("FLEET_TUI_BIN", "/opt/fleet tools/cli");
        assert_eq!(
            expand_cmdline_env("${FLEET_BIN} list-instances"),
            "\"/opt/fleet tools/cli\" list-instances"
        );
        env::remove_var("FLEET_TUI_BIN");
    }

    #[test]
    fn parse_instances_reads_envelope_and_keeps_raw() {
        let v = json!({
            "ok": true,
            "data": {
                "instances": [
                    {"id": "i-1", "state": "running", "zone": "eu-1a", "billing": {"tier": "spot"}},
                    {"id": "i-2", "state": "stopped"},
                    {"id": "i-3", "state": "running", "name": "worker"}
                ]
            }
        });
        let recs = parse_instances(&v).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].id, "i-1");
        assert_eq!(recs[2].name.as_deref(), Some("worker"));
        // unknown fields survive in raw for the detail view
        assert_eq!(recs[0].raw["billing"]["tier"], "spot");
    }

    #[test]
    fn parse_health_reads_envelope() {
        let v = json!({
            "data": {
                "statuses": [
                    {"id": "i-1", "status": "ok"},
                    {"id": "i-2", "status": "impaired", "detail": "disk"}
                ]
            }
        });
        let hs = parse_health(&v).unwrap();
        assert_eq!(hs.len(), 2);
        assert_eq!(hs[0].status, HealthStatus::Ok);
        assert_eq!(hs[1].detail.as_deref(), Some("disk"));
    }

    #[test]
    fn parse_instances_rejects_missing_array() {
        let v = json!({"data": {"instances": "nope"}});
        let err = parse_instances(&v).unwrap_err();
        assert!(matches!(err, InventoryError::Payload(_)));
    }
}
