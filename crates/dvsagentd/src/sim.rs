//! In-memory switch backend.
//!
//! `SimSwitch` records every operation it receives instead of talking to a
//! real switch SDK. The daemon wires it in when no SDK integration is
//! configured (simulation mode), and the test suites assert against its
//! operation log.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use dvs_agent_common::{
    AgentResult, Network, NetworkSegment, PortRuleSet, PortState, SwitchHandle,
};

use crate::poll_loop::PollSource;

/// One recorded switch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOp {
    /// A port group was created for a network.
    CreateNetwork {
        /// Network id.
        network: String,
        /// VLAN id of the backing segment.
        segmentation_id: Option<u32>,
    },
    /// A network's port group was reconciled with an updated record.
    UpdateNetwork {
        /// Network id.
        network: String,
    },
    /// A network's port group was removed.
    DeleteNetwork {
        /// Network id.
        network: String,
    },
    /// A port slot was reserved during binding.
    BookPort {
        /// Network id.
        network: String,
        /// Port id.
        port: String,
    },
    /// A port's switch-side resources were released.
    ReleasePort {
        /// Port id.
        port: String,
    },
    /// A port's blocked/admin state was applied.
    SwitchPortBlockedState {
        /// Port id.
        port: String,
        /// Administrative state that was applied.
        admin_state_up: bool,
    },
    /// A batch of finalized rule sets was pushed.
    UpdatePortRules {
        /// Port ids in batch order.
        ports: Vec<String>,
        /// Total number of rules across the batch.
        rule_count: usize,
    },
}

/// Switch handle that records operations in memory.
pub struct SimSwitch {
    name: String,
    ops: Mutex<Vec<SwitchOp>>,
}

impl SimSwitch {
    /// Creates a simulation switch.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of the recorded operations.
    pub async fn operations(&self) -> Vec<SwitchOp> {
        self.ops.lock().await.clone()
    }

    async fn record(&self, op: SwitchOp) {
        debug!(switch = %self.name, ?op, "switch operation");
        self.ops.lock().await.push(op);
    }
}

#[async_trait]
impl SwitchHandle for SimSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_network(&self, network: &Network, segment: &NetworkSegment) -> AgentResult<()> {
        self.record(SwitchOp::CreateNetwork {
            network: network.id.clone(),
            segmentation_id: segment.segmentation_id,
        })
        .await;
        Ok(())
    }

    async fn update_network(&self, network: &Network, _original: &Network) -> AgentResult<()> {
        self.record(SwitchOp::UpdateNetwork {
            network: network.id.clone(),
        })
        .await;
        Ok(())
    }

    async fn delete_network(&self, network: &Network) -> AgentResult<()> {
        self.record(SwitchOp::DeleteNetwork {
            network: network.id.clone(),
        })
        .await;
        Ok(())
    }

    async fn book_port(&self, network: &Network, port_id: &str) -> AgentResult<()> {
        self.record(SwitchOp::BookPort {
            network: network.id.clone(),
            port: port_id.to_string(),
        })
        .await;
        Ok(())
    }

    async fn release_port(&self, port: &PortState) -> AgentResult<()> {
        self.record(SwitchOp::ReleasePort {
            port: port.id.clone(),
        })
        .await;
        Ok(())
    }

    async fn switch_port_blocked_state(&self, port: &PortState) -> AgentResult<()> {
        self.record(SwitchOp::SwitchPortBlockedState {
            port: port.id.clone(),
            admin_state_up: port.admin_state_up,
        })
        .await;
        Ok(())
    }

    async fn update_port_rules(&self, ports: &[PortRuleSet]) -> AgentResult<()> {
        self.record(SwitchOp::UpdatePortRules {
            ports: ports.iter().map(|p| p.port_id().to_string()).collect(),
            rule_count: ports.iter().map(|p| p.rules.len()).sum(),
        })
        .await;
        Ok(())
    }
}

/// Poll source with no local event feed.
///
/// Stands in for the message-transport integration: it reports no pending
/// work and counts full-sync requests so the daemon loop stays observable.
#[derive(Debug, Default)]
pub struct SimPollSource {
    full_sync_requests: u64,
}

impl SimPollSource {
    /// Creates an idle poll source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many full syncs were requested from the control plane.
    pub fn full_sync_requests(&self) -> u64 {
        self.full_sync_requests
    }
}

#[async_trait]
impl PollSource for SimPollSource {
    fn force_full_sync(&mut self) {
        self.full_sync_requests += 1;
        info!("requesting full resync from control plane");
    }

    fn polling_required(&self) -> bool {
        false
    }

    fn firewall_refresh_needed(&self) -> bool {
        false
    }

    async fn process_updates(&mut self) -> AgentResult<()> {
        Ok(())
    }
}
