//! Physical-network to switch resolution.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use dvs_agent_common::{AgentError, AgentResult, NetworkSegment, NetworkType, SwitchHandle};

/// Immutable mapping from physical network name to switch handle.
///
/// Built once from configuration at startup and read-only thereafter,
/// which makes lookups thread-safe without locking.
pub struct SwitchRegistry {
    switches: HashMap<String, Arc<dyn SwitchHandle>>,
}

impl SwitchRegistry {
    /// Creates a registry from an already-built mapping.
    pub fn new(switches: HashMap<String, Arc<dyn SwitchHandle>>) -> Self {
        Self { switches }
    }

    /// Resolves the switch backing a segment.
    ///
    /// Fails with [`AgentError::UnsupportedSegmentType`] for non-VLAN
    /// segments and [`AgentError::NoSwitchForPhysicalNetwork`] for
    /// unmapped physical networks. Never silently no-ops.
    pub fn resolve(&self, segment: &NetworkSegment) -> AgentResult<Arc<dyn SwitchHandle>> {
        if segment.network_type != NetworkType::Vlan {
            return Err(AgentError::unsupported_segment_type(
                segment.network_type.as_str(),
            ));
        }
        self.switches
            .get(&segment.physical_network)
            .cloned()
            .ok_or_else(|| {
                debug!(
                    physical_network = %segment.physical_network,
                    "no switch mapped for physical network"
                );
                AgentError::no_switch_for(&segment.physical_network)
            })
    }

    /// Returns the number of mapped physical networks.
    pub fn len(&self) -> usize {
        self.switches.len()
    }

    /// Returns true if no physical network is mapped.
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Iterates the mapping as (physical network, switch name) pairs.
    pub fn mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.switches
            .iter()
            .map(|(physnet, switch)| (physnet.as_str(), switch.name()))
    }
}
