//! Liveness reporting to the control plane.
//!
//! The heartbeat runs on its own fixed-interval timer, independent of the
//! polling loop. A report that comes back "revived" means the control
//! plane had marked this agent dead: the shared full-resync flag is set so
//! the next loop iteration recovers. Report failures are logged and never
//! stop the timer.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use dvs_agent_common::{AgentConfig, AgentResult};

use crate::poll_loop::FullSyncFlag;

/// Agent liveness state reported with every heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    /// Daemon binary name.
    pub binary: String,
    /// Hypervisor host this agent runs on.
    pub host: String,
    /// Reporting topic.
    pub topic: String,
    /// Agent type label.
    pub agent_type: String,
    /// True until the first successful report after startup.
    pub start_flag: bool,
    /// Free-form configuration summary for the control plane.
    pub configurations: serde_json::Value,
}

impl AgentState {
    /// Builds the startup state from configuration.
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            binary: "dvsagentd".to_string(),
            host: config.host.clone(),
            topic: "l2-agent".to_string(),
            agent_type: "Distributed virtual switch agent".to_string(),
            start_flag: true,
            configurations: serde_json::json!({
                "network_maps": config.network_maps,
                "polling_interval_secs": config.polling_interval_secs,
                "log_agent_heartbeats": config.log_agent_heartbeats,
            }),
        }
    }
}

/// Status returned by the control plane for a heartbeat report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// First time the control plane sees this agent.
    New,
    /// Agent is alive and was alive before.
    Alive,
    /// Agent was considered dead and has just come back.
    Revived,
}

/// Control-plane reporting collaborator.
#[async_trait]
pub trait StateReporter: Send + Sync {
    /// Reports agent state; `use_call` requests a synchronous round trip.
    async fn report_state(&self, state: &AgentState, use_call: bool) -> AgentResult<AgentStatus>;
}

/// Reporter used in simulation mode: logs the report and stays alive.
#[derive(Debug, Default)]
pub struct LoggingReporter;

#[async_trait]
impl StateReporter for LoggingReporter {
    async fn report_state(&self, state: &AgentState, _use_call: bool) -> AgentResult<AgentStatus> {
        debug!(host = %state.host, start_flag = state.start_flag, "state report");
        Ok(AgentStatus::Alive)
    }
}

/// Fixed-interval heartbeat driver.
pub struct Heartbeat {
    reporter: Arc<dyn StateReporter>,
    state: AgentState,
    full_sync: FullSyncFlag,
    interval: Duration,
    log_heartbeats: bool,
}

impl Heartbeat {
    /// Creates a heartbeat driver.
    pub fn new(
        reporter: Arc<dyn StateReporter>,
        state: AgentState,
        full_sync: FullSyncFlag,
        interval: Duration,
        log_heartbeats: bool,
    ) -> Self {
        Self {
            reporter,
            state,
            full_sync,
            interval,
            log_heartbeats,
        }
    }

    /// Sends one report and applies its outcome.
    pub async fn beat(&mut self) {
        match self.reporter.report_state(&self.state, true).await {
            Ok(status) => {
                if self.log_heartbeats {
                    info!(?status, "heartbeat reported");
                }
                if status == AgentStatus::Revived {
                    info!("agent has just revived, scheduling full resync");
                    self.full_sync.set();
                }
                self.state.start_flag = false;
            }
            Err(err) => {
                error!(error = %err, "failed reporting state");
            }
        }
    }

    /// Spawns the heartbeat on its own timer task.
    ///
    /// The task runs until aborted; the daemon aborts it on shutdown.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.beat().await;
            }
        })
    }
}
