//! The switch-handle capability.
//!
//! A [`SwitchHandle`] is one managed distributed virtual switch instance.
//! The reconciliation core only decides *what* to call and *when*; the
//! implementation behind this trait owns the SDK session and wire protocol.
//! Implementations do not retry: the agent wraps every call with its own
//! retry policy.

use async_trait::async_trait;

use crate::error::AgentResult;
use crate::types::{Network, NetworkSegment, PortRuleSet, PortState};

/// Network, port and security operations on one distributed virtual switch.
///
/// All operations must be idempotent: the control plane delivers events
/// at least once, and the retry policy re-executes transient failures.
#[async_trait]
pub trait SwitchHandle: Send + Sync {
    /// Returns the switch name, for logging.
    fn name(&self) -> &str;

    /// Creates the port group backing `network` on this switch.
    async fn create_network(&self, network: &Network, segment: &NetworkSegment)
        -> AgentResult<()>;

    /// Reconciles the port group with an updated network record.
    async fn update_network(&self, network: &Network, original: &Network) -> AgentResult<()>;

    /// Removes the port group backing `network`.
    async fn delete_network(&self, network: &Network) -> AgentResult<()>;

    /// Reserves a port slot for `port_id` during binding negotiation.
    async fn book_port(&self, network: &Network, port_id: &str) -> AgentResult<()>;

    /// Releases all switch-side resources held by `port`.
    async fn release_port(&self, port: &PortState) -> AgentResult<()>;

    /// Applies the port's administrative state to the switch port.
    async fn switch_port_blocked_state(&self, port: &PortState) -> AgentResult<()>;

    /// Pushes finalized security rules for a batch of ports.
    async fn update_port_rules(&self, ports: &[PortRuleSet]) -> AgentResult<()>;
}
