//! Common building blocks for the DVS agent.
//!
//! This crate provides the leaf abstractions shared by the agent daemon:
//!
//! - [`types`]: event payload snapshots delivered by the control plane
//! - [`error`]: the [`AgentError`] kinds and their transient/permanent split
//! - [`retry`]: the [`RetryPolicy`] wrapping every switch-mutating call
//! - [`config`]: the [`AgentConfig`] struct and mapping-table parsing
//! - [`switch`]: the [`SwitchHandle`] capability behind which the real
//!   switch SDK lives
//!
//! # Architecture
//!
//! The agent follows an event-driven reconciliation model:
//!
//! 1. The control plane emits network/port/security lifecycle events
//! 2. Reconciliation callbacks resolve the backing switch per segment
//! 3. Security-group deltas are computed into minimal rule-push batches
//! 4. Switch calls are retried on transient failure, bounded by policy
//! 5. A polling loop periodically forces full resync to heal drift

pub mod config;
pub mod error;
pub mod retry;
pub mod switch;
pub mod types;

pub use config::{parse_network_maps, AgentConfig};
pub use error::{AgentError, AgentResult};
pub use retry::RetryPolicy;
pub use switch::SwitchHandle;
pub use types::{
    BindingType, Ethertype, Network, NetworkSegment, NetworkType, PortRuleSet, PortState,
    PortStatus, RuleDirection, SecurityGroupInfo, SecurityGroupRule,
};
