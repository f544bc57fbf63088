//! Reconciliation callbacks for control-plane lifecycle events.
//!
//! One method per event. Each resolves the backing switch for the event's
//! segment, then delegates to the switch handle under the retry policy.
//! Segments this agent does not manage (non-VLAN, unmapped physical
//! network) are skipped with an info log for network events; for ports
//! already bound to this agent, a missing mapping is a control-plane
//! inconsistency and escalates to `InvalidSystemState`.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use dvs_agent_common::{
    AgentError, AgentResult, Network, NetworkSegment, PortState, PortStatus, RetryPolicy,
    SecurityGroupInfo, SwitchHandle,
};

use crate::registry::SwitchRegistry;
use crate::security::SecurityGroupDiffEngine;

/// The agent's reconciliation orchestrator.
///
/// Explicit composition over the switch registry, retry policy and
/// security diff engine; callbacks may run concurrently with the polling
/// loop, so all methods take `&self` and hold no mutable state.
pub struct DvsAgent {
    registry: SwitchRegistry,
    retry: RetryPolicy,
    sg_engine: SecurityGroupDiffEngine,
}

impl DvsAgent {
    /// Creates the orchestrator.
    pub fn new(registry: SwitchRegistry, retry: RetryPolicy) -> Self {
        Self {
            registry,
            retry,
            sg_engine: SecurityGroupDiffEngine::new(),
        }
    }

    /// Returns the switch registry.
    pub fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    /// Handles network creation.
    #[instrument(skip_all, fields(network = %network.id))]
    pub async fn create_network(
        &self,
        network: &Network,
        segment: &NetworkSegment,
    ) -> AgentResult<()> {
        let Some(switch) = self.resolve_for_network(segment, &network.id, "created")? else {
            return Ok(());
        };
        self.retry
            .execute(|| switch.create_network(network, segment))
            .await
    }

    /// Handles network updates.
    #[instrument(skip_all, fields(network = %network.id))]
    pub async fn update_network(
        &self,
        network: &Network,
        original: &Network,
        segment: &NetworkSegment,
    ) -> AgentResult<()> {
        let Some(switch) = self.resolve_for_network(segment, &network.id, "updated")? else {
            return Ok(());
        };
        self.retry
            .execute(|| switch.update_network(network, original))
            .await
    }

    /// Handles network deletion.
    #[instrument(skip_all, fields(network = %network.id))]
    pub async fn delete_network(
        &self,
        network: &Network,
        segment: &NetworkSegment,
    ) -> AgentResult<()> {
        let Some(switch) = self.resolve_for_network(segment, &network.id, "deleted")? else {
            return Ok(());
        };
        self.retry.execute(|| switch.delete_network(network)).await
    }

    /// Reserves a port slot on every switch backing the network.
    ///
    /// Booking runs during binding negotiation, before the port is owned
    /// by this agent, so unresolvable segments are skipped rather than
    /// escalated. All candidate segments are booked, without
    /// deduplication: a network carrying several VLAN segments needs the
    /// reservation on each backing switch.
    #[instrument(skip_all, fields(network = %network.id, port = %port.id))]
    pub async fn bind_port(
        &self,
        network: &Network,
        segments: &[NetworkSegment],
        port: &PortState,
    ) -> AgentResult<()> {
        for segment in segments {
            let switch = match self.registry.resolve(segment) {
                Ok(switch) => switch,
                Err(err) if err.is_unmanaged_segment() => {
                    info!(
                        physical_network = %segment.physical_network,
                        reason = %err,
                        "port not booked on segment"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            self.retry
                .execute(|| switch.book_port(network, &port.id))
                .await?;
        }
        Ok(())
    }

    /// Handles port updates: admin-state toggles and security deltas.
    ///
    /// A port whose original status was DOWN forces a full security push,
    /// because DOWN ports may carry stale or missing applied rules.
    #[instrument(skip_all, fields(port = %current.id))]
    pub async fn update_port(
        &self,
        current: &PortState,
        original: &PortState,
        segment: &NetworkSegment,
        sg_info: &SecurityGroupInfo,
    ) -> AgentResult<()> {
        let Some(switch) = self.resolve_for_port(segment, &current.id, "updated")? else {
            return Ok(());
        };

        if current.admin_state_up != original.admin_state_up {
            self.retry
                .execute(|| switch.switch_port_blocked_state(current))
                .await?;
        }

        let force = original.status == PortStatus::Down;
        self.push_security_updates(&switch, current, original, sg_info, force)
            .await
    }

    /// Handles port deletion.
    ///
    /// Always flushes security updates before releasing the port: other
    /// members' remote-group rules must stop referencing it, regardless of
    /// the port's own final state.
    #[instrument(skip_all, fields(port = %current.id))]
    pub async fn delete_port(
        &self,
        current: &PortState,
        original: &PortState,
        segment: &NetworkSegment,
        sg_info: &SecurityGroupInfo,
    ) -> AgentResult<()> {
        let Some(switch) = self.resolve_for_port(segment, &current.id, "deleted")? else {
            return Ok(());
        };

        self.push_security_updates(&switch, current, original, sg_info, true)
            .await?;
        self.retry.execute(|| switch.release_port(current)).await
    }

    /// Runs the diff engine and pushes the resulting batch, if any.
    async fn push_security_updates(
        &self,
        switch: &Arc<dyn SwitchHandle>,
        current: &PortState,
        original: &PortState,
        sg_info: &SecurityGroupInfo,
        force: bool,
    ) -> AgentResult<()> {
        let batch = self.sg_engine.compute(current, original, sg_info, force);
        if batch.is_empty() {
            debug!(port = %current.id, "no security updates required");
            return Ok(());
        }
        debug!(
            port = %current.id,
            ports = batch.len(),
            "pushing security rule updates"
        );
        self.retry
            .execute(|| switch.update_port_rules(&batch))
            .await
    }

    /// Resolution for network events: unmanaged segments are skipped.
    fn resolve_for_network(
        &self,
        segment: &NetworkSegment,
        network_id: &str,
        action: &str,
    ) -> AgentResult<Option<Arc<dyn SwitchHandle>>> {
        match self.registry.resolve(segment) {
            Ok(switch) => Ok(Some(switch)),
            Err(err) if err.is_unmanaged_segment() => {
                info!(network = %network_id, reason = %err, "network not {action}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolution for port events: an unsupported segment type is skipped,
    /// but a missing mapping means the control plane bound a port to this
    /// agent without a known network, which is an invalid system state.
    fn resolve_for_port(
        &self,
        segment: &NetworkSegment,
        port_id: &str,
        action: &str,
    ) -> AgentResult<Option<Arc<dyn SwitchHandle>>> {
        match self.registry.resolve(segment) {
            Ok(switch) => Ok(Some(switch)),
            Err(err @ AgentError::UnsupportedSegmentType { .. }) => {
                info!(port = %port_id, reason = %err, "port not {action}");
                Ok(None)
            }
            Err(AgentError::NoSwitchForPhysicalNetwork { physical_network }) => {
                Err(AgentError::invalid_system_state(format!(
                    "port {port_id} is managed by this agent, but physical network \
                     '{physical_network}' has no switch mapping"
                )))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SwitchRegistry;
    use crate::sim::{SimSwitch, SwitchOp};
    use async_trait::async_trait;
    use dvs_agent_common::{NetworkType, PortRuleSet, RuleDirection, SecurityGroupRule};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn agent_with(physnets: &[&str]) -> (DvsAgent, Vec<Arc<SimSwitch>>) {
        let mut switches: HashMap<String, Arc<dyn SwitchHandle>> = HashMap::new();
        let mut handles = Vec::new();
        for p in physnets {
            let switch = Arc::new(SimSwitch::new(format!("dvs-{p}")));
            handles.push(Arc::clone(&switch));
            switches.insert(p.to_string(), switch);
        }
        (
            DvsAgent::new(SwitchRegistry::new(switches), RetryPolicy::no_delay(3)),
            handles,
        )
    }

    fn sg_info_with_device(port: &PortState) -> SecurityGroupInfo {
        let mut info = SecurityGroupInfo::default();
        info.devices.insert(port.id.clone(), port.clone());
        info
    }

    #[tokio::test]
    async fn test_create_network_delegates_to_switch() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let network = Network::new("net-1", "tenant-net");
        let segment = NetworkSegment::vlan("physnet1", 100);

        agent.create_network(&network, &segment).await.unwrap();

        let ops = switches[0].operations().await;
        assert_eq!(
            ops,
            vec![SwitchOp::CreateNetwork {
                network: "net-1".to_string(),
                segmentation_id: Some(100),
            }]
        );
    }

    #[tokio::test]
    async fn test_create_network_skips_unmapped_physnet() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let network = Network::new("net-1", "tenant-net");
        let segment = NetworkSegment::vlan("physnet9", 100);

        agent.create_network(&network, &segment).await.unwrap();
        assert!(switches[0].operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_network_skips_non_vlan() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let network = Network::new("net-1", "tenant-net");
        let segment = NetworkSegment::new(NetworkType::Vxlan, "physnet1", Some(5000));

        agent.create_network(&network, &segment).await.unwrap();
        assert!(switches[0].operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_network() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let network = Network::new("net-1", "tenant-net");
        let original = Network::new("net-1", "old-name");
        let segment = NetworkSegment::vlan("physnet1", 100);

        agent
            .update_network(&network, &original, &segment)
            .await
            .unwrap();
        agent.delete_network(&network, &segment).await.unwrap();

        let ops = switches[0].operations().await;
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], SwitchOp::UpdateNetwork { .. }));
        assert!(matches!(ops[1], SwitchOp::DeleteNetwork { .. }));
    }

    #[tokio::test]
    async fn test_bind_port_books_every_resolvable_segment() {
        let (agent, switches) = agent_with(&["physnet1", "physnet2"]);
        let network = Network::new("net-1", "tenant-net");
        let port = PortState::new("port-1");
        let segments = vec![
            NetworkSegment::vlan("physnet1", 100),
            NetworkSegment::vlan("physnet-unknown", 101),
            NetworkSegment::vlan("physnet2", 102),
        ];

        agent.bind_port(&network, &segments, &port).await.unwrap();

        for switch in &switches {
            let ops = switch.operations().await;
            assert_eq!(
                ops,
                vec![SwitchOp::BookPort {
                    network: "net-1".to_string(),
                    port: "port-1".to_string(),
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_update_port_escalates_unmapped_physnet() {
        let (agent, _switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1");
        let original = PortState::new("port-1");
        let segment = NetworkSegment::vlan("physnet9", 100);

        let err = agent
            .update_port(&current, &original, &segment, &SecurityGroupInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSystemState { .. }));
    }

    #[tokio::test]
    async fn test_delete_port_escalates_unmapped_physnet() {
        let (agent, _switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1");
        let original = PortState::new("port-1");
        let segment = NetworkSegment::vlan("physnet9", 100);

        let err = agent
            .delete_port(&current, &original, &segment, &SecurityGroupInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSystemState { .. }));
    }

    #[tokio::test]
    async fn test_update_port_skips_non_vlan() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1");
        let original = PortState::new("port-1");
        let segment = NetworkSegment::new(NetworkType::Gre, "physnet1", Some(7));

        agent
            .update_port(&current, &original, &segment, &SecurityGroupInfo::default())
            .await
            .unwrap();
        assert!(switches[0].operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_port_toggles_admin_state() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1").with_admin_state_up(false);
        let original = PortState::new("port-1");
        let segment = NetworkSegment::vlan("physnet1", 100);

        agent
            .update_port(&current, &original, &segment, &sg_info_with_device(&current))
            .await
            .unwrap();

        let ops = switches[0].operations().await;
        assert_eq!(
            ops,
            vec![SwitchOp::SwitchPortBlockedState {
                port: "port-1".to_string(),
                admin_state_up: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_update_port_unchanged_admin_state_no_toggle() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1");
        let original = PortState::new("port-1");
        let segment = NetworkSegment::vlan("physnet1", 100);

        agent
            .update_port(&current, &original, &segment, &sg_info_with_device(&current))
            .await
            .unwrap();
        assert!(switches[0].operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_port_from_down_forces_security_push() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1").with_security_groups(["sg-a"]);
        let original = PortState::new("port-1")
            .with_security_groups(["sg-a"])
            .with_status(PortStatus::Down);
        let segment = NetworkSegment::vlan("physnet1", 100);
        let mut info = sg_info_with_device(&current);
        info.security_groups.insert(
            "sg-a".to_string(),
            vec![SecurityGroupRule::new(
                RuleDirection::Ingress,
                dvs_agent_common::Ethertype::Ipv4,
            )],
        );

        agent
            .update_port(&current, &original, &segment, &info)
            .await
            .unwrap();

        let ops = switches[0].operations().await;
        assert_eq!(
            ops,
            vec![SwitchOp::UpdatePortRules {
                ports: vec!["port-1".to_string()],
                rule_count: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_port_flushes_then_releases() {
        let (agent, switches) = agent_with(&["physnet1"]);
        let current = PortState::new("port-1").with_security_groups(["sg-a"]);
        let original = PortState::new("port-1").with_security_groups(["sg-a"]);
        let segment = NetworkSegment::vlan("physnet1", 100);
        let mut info = sg_info_with_device(&current);
        info.security_groups.insert(
            "sg-a".to_string(),
            vec![SecurityGroupRule::new(
                RuleDirection::Ingress,
                dvs_agent_common::Ethertype::Ipv4,
            )],
        );

        agent
            .delete_port(&current, &original, &segment, &info)
            .await
            .unwrap();

        let ops = switches[0].operations().await;
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], SwitchOp::UpdatePortRules { .. }));
        assert_eq!(
            ops[1],
            SwitchOp::ReleasePort {
                port: "port-1".to_string()
            }
        );
    }

    /// Switch that fails transiently a fixed number of times per call site.
    struct FlakySwitch {
        inner: Arc<SimSwitch>,
        failures_left: AtomicU32,
    }

    impl FlakySwitch {
        fn new(failures: u32) -> Self {
            Self {
                inner: Arc::new(SimSwitch::new("dvs-flaky")),
                failures_left: AtomicU32::new(failures),
            }
        }

        fn try_fail(&self) -> AgentResult<()> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(AgentError::switch_unavailable("dvs-flaky", "task queue busy"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SwitchHandle for FlakySwitch {
        fn name(&self) -> &str {
            "dvs-flaky"
        }

        async fn create_network(
            &self,
            network: &Network,
            segment: &NetworkSegment,
        ) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.create_network(network, segment).await
        }

        async fn update_network(&self, network: &Network, original: &Network) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.update_network(network, original).await
        }

        async fn delete_network(&self, network: &Network) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.delete_network(network).await
        }

        async fn book_port(&self, network: &Network, port_id: &str) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.book_port(network, port_id).await
        }

        async fn release_port(&self, port: &PortState) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.release_port(port).await
        }

        async fn switch_port_blocked_state(&self, port: &PortState) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.switch_port_blocked_state(port).await
        }

        async fn update_port_rules(&self, ports: &[PortRuleSet]) -> AgentResult<()> {
            self.try_fail()?;
            self.inner.update_port_rules(ports).await
        }
    }

    #[tokio::test]
    async fn test_transient_switch_failures_are_retried() {
        let flaky = Arc::new(FlakySwitch::new(2));
        let recorder = Arc::clone(&flaky.inner);
        let mut switches: HashMap<String, Arc<dyn SwitchHandle>> = HashMap::new();
        switches.insert("physnet1".to_string(), flaky);
        let agent = DvsAgent::new(SwitchRegistry::new(switches), RetryPolicy::no_delay(3));

        let network = Network::new("net-1", "tenant-net");
        let segment = NetworkSegment::vlan("physnet1", 100);
        agent.create_network(&network, &segment).await.unwrap();

        assert_eq!(recorder.operations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_transient_error() {
        let flaky = Arc::new(FlakySwitch::new(10));
        let mut switches: HashMap<String, Arc<dyn SwitchHandle>> = HashMap::new();
        switches.insert("physnet1".to_string(), flaky);
        let agent = DvsAgent::new(SwitchRegistry::new(switches), RetryPolicy::no_delay(3));

        let network = Network::new("net-1", "tenant-net");
        let segment = NetworkSegment::vlan("physnet1", 100);
        let err = agent.create_network(&network, &segment).await.unwrap_err();
        assert!(matches!(err, AgentError::SwitchUnavailable { .. }));
    }
}
