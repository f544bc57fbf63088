//! dvsagentd - distributed virtual switch reconciliation agent
//!
//! Long-lived daemon running on each hypervisor host. It receives
//! network/port/security-group lifecycle events from the cloud control
//! plane and applies them idempotently to the local distributed virtual
//! switch:
//!
//! 1. [`SwitchRegistry`] resolves a segment's physical network to the
//!    switch handle backing it
//! 2. [`DvsAgent`] maps each lifecycle event to switch operations, under
//!    a bounded retry policy
//! 3. [`SecurityGroupDiffEngine`] computes minimal security rule-push
//!    batches from incremental membership diffs
//! 4. [`PollingLoop`] drives periodic resynchronization and cooperative
//!    shutdown
//! 5. [`Heartbeat`] reports liveness and schedules a full resync when the
//!    control plane says the agent has revived

pub mod heartbeat;
pub mod poll_loop;
pub mod reconcile;
pub mod registry;
pub mod security;
pub mod sim;

pub use heartbeat::{AgentState, AgentStatus, Heartbeat, LoggingReporter, StateReporter};
pub use poll_loop::{FullSyncFlag, PollSource, PollingLoop, ShutdownHandle};
pub use reconcile::DvsAgent;
pub use registry::SwitchRegistry;
pub use security::SecurityGroupDiffEngine;
pub use sim::{SimPollSource, SimSwitch, SwitchOp};
