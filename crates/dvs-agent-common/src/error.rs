//! Error types for agent reconciliation operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. The agent
//! never exits because of a reconciliation error; only configuration
//! errors raised at startup are fatal to the process.

use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur while reconciling control-plane state against
/// the distributed virtual switch.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// No switch is mapped for the segment's physical network.
    ///
    /// Recoverable for network events (the network is simply not managed
    /// by this agent); escalated to [`AgentError::InvalidSystemState`] for
    /// ports already bound to this agent.
    #[error("no switch mapped for physical network '{physical_network}'")]
    NoSwitchForPhysicalNetwork {
        /// The physical network name that has no mapping.
        physical_network: String,
    },

    /// The segment's network type is not handled by this agent.
    ///
    /// Only VLAN segments are supported; everything else is skipped.
    #[error("network type '{network_type}' is not supported")]
    UnsupportedSegmentType {
        /// The offending network type.
        network_type: String,
    },

    /// Control-plane state and agent state disagree.
    ///
    /// Fatal for the triggering event only; the daemon keeps running and
    /// the next full resync restores consistency.
    #[error("invalid system state: {details}")]
    InvalidSystemState {
        /// Human-readable description of the inconsistency.
        details: String,
    },

    /// A switch call failed for a transient reason (session dropped,
    /// task queue busy). Retried by the retry policy.
    #[error("switch '{switch}' unavailable: {message}")]
    SwitchUnavailable {
        /// Name of the switch that rejected the call.
        switch: String,
        /// Underlying failure description.
        message: String,
    },

    /// A switch call failed permanently. The event is dropped and logged;
    /// the next full resync self-heals.
    #[error("switch operation '{operation}' failed: {message}")]
    SwitchOperation {
        /// The operation that failed (e.g. "create_network").
        operation: String,
        /// Underlying failure description.
        message: String,
    },

    /// Startup configuration is invalid. The only process-fatal error.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The configuration field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl AgentError {
    /// Creates a no-switch-for-physical-network error.
    pub fn no_switch_for(physical_network: impl Into<String>) -> Self {
        Self::NoSwitchForPhysicalNetwork {
            physical_network: physical_network.into(),
        }
    }

    /// Creates an unsupported-segment-type error.
    pub fn unsupported_segment_type(network_type: impl Into<String>) -> Self {
        Self::UnsupportedSegmentType {
            network_type: network_type.into(),
        }
    }

    /// Creates an invalid-system-state error.
    pub fn invalid_system_state(details: impl Into<String>) -> Self {
        Self::InvalidSystemState {
            details: details.into(),
        }
    }

    /// Creates a transient switch-unavailable error.
    pub fn switch_unavailable(switch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SwitchUnavailable {
            switch: switch.into(),
            message: message.into(),
        }
    }

    /// Creates a permanent switch-operation error.
    pub fn switch_operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SwitchOperation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition that
    /// may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::SwitchUnavailable { .. })
    }

    /// Returns true if the operation may be skipped with an info log:
    /// the segment is not managed by this agent.
    pub fn is_unmanaged_segment(&self) -> bool {
        matches!(
            self,
            AgentError::NoSwitchForPhysicalNetwork { .. }
                | AgentError::UnsupportedSegmentType { .. }
        )
    }
}
