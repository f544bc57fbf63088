//! Agent configuration.
//!
//! All values are supplied as plain data at construction time; there is no
//! ambient global configuration state. Mapping-table validation is the only
//! error class that is fatal to the process.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AgentError, AgentResult};

/// Configuration for a DVS agent process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hostname reported to the control plane.
    pub host: String,
    /// `<physical_network>:<switch>` mapping entries.
    pub network_maps: Vec<String>,
    /// Seconds between polling iterations of the daemon loop.
    pub polling_interval_secs: u64,
    /// Seconds between heartbeat state reports.
    pub report_interval_secs: u64,
    /// Retry bound for switch calls that fail transiently.
    pub api_retry_count: u32,
    /// Milliseconds between retry attempts.
    pub retry_delay_ms: u64,
    /// Log every successful heartbeat report at info level.
    pub log_agent_heartbeats: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            network_maps: Vec::new(),
            polling_interval_secs: 2,
            report_interval_secs: 30,
            api_retry_count: 10,
            retry_delay_ms: 1000,
            log_agent_heartbeats: false,
        }
    }
}

impl AgentConfig {
    /// Returns the polling interval as a duration.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Returns the heartbeat report interval as a duration.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Returns the inter-retry delay as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Parses `<physical_network>:<switch>` mapping entries into a lookup table.
///
/// Rejects malformed entries, empty names and duplicate physical networks.
pub fn parse_network_maps(maps: &[String]) -> AgentResult<HashMap<String, String>> {
    let mut parsed = HashMap::with_capacity(maps.len());
    for entry in maps {
        let (physical_network, switch) = entry.split_once(':').ok_or_else(|| {
            AgentError::invalid_config(
                "network_maps",
                format!("expected <physical_network>:<switch>, got '{entry}'"),
            )
        })?;
        let physical_network = physical_network.trim();
        let switch = switch.trim();
        if physical_network.is_empty() || switch.is_empty() {
            return Err(AgentError::invalid_config(
                "network_maps",
                format!("empty name in entry '{entry}'"),
            ));
        }
        if parsed
            .insert(physical_network.to_string(), switch.to_string())
            .is_some()
        {
            return Err(AgentError::invalid_config(
                "network_maps",
                format!("duplicate physical network '{physical_network}'"),
            ));
        }
    }
    Ok(parsed)
}
