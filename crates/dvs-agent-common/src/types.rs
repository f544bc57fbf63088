//! Event payload types delivered by the control plane.
//!
//! These are point-in-time snapshots constructed per event by the message
//! transport and discarded after processing. Ordered collections are used
//! throughout so that diff computations over them are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

/// Network segment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// VLAN segmentation. The only type handled by this agent.
    Vlan,
    /// VXLAN overlay.
    Vxlan,
    /// GRE overlay.
    Gre,
    /// Flat (untagged) network.
    Flat,
    /// Host-local network.
    Local,
}

impl NetworkType {
    /// Returns the wire name of this network type.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Vlan => "vlan",
            NetworkType::Vxlan => "vxlan",
            NetworkType::Gre => "gre",
            NetworkType::Flat => "flat",
            NetworkType::Local => "local",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network's binding to a physical transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    /// Segmentation technology of this segment.
    pub network_type: NetworkType,
    /// Name of the physical network carrying the segment.
    pub physical_network: String,
    /// Segmentation id (VLAN id for VLAN segments).
    pub segmentation_id: Option<u32>,
}

impl NetworkSegment {
    /// Creates a segment.
    pub fn new(
        network_type: NetworkType,
        physical_network: impl Into<String>,
        segmentation_id: Option<u32>,
    ) -> Self {
        Self {
            network_type,
            physical_network: physical_network.into(),
            segmentation_id,
        }
    }

    /// Creates a VLAN segment.
    pub fn vlan(physical_network: impl Into<String>, vlan_id: u32) -> Self {
        Self::new(NetworkType::Vlan, physical_network, Some(vlan_id))
    }
}

/// Network record delivered with network lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Control-plane network id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Administrative state.
    pub admin_state_up: bool,
}

impl Network {
    /// Creates a network record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            admin_state_up: true,
        }
    }
}

/// Operational status of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortStatus {
    /// Port is provisioned and forwarding.
    Active,
    /// Port is down. A port leaving this state forces a full rule push.
    Down,
    /// Port is being built.
    Build,
    /// Port is in error state.
    Error,
}

impl PortStatus {
    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PortStatus::Active => "ACTIVE",
            PortStatus::Down => "DOWN",
            PortStatus::Build => "BUILD",
            PortStatus::Error => "ERROR",
        }
    }
}

/// Which backend manages a port.
///
/// Only distributed-switch ports are relevant to security rule pushes;
/// every unrecognized wire value maps to [`BindingType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BindingType {
    /// The port is managed by the distributed virtual switch.
    DistributedSwitch,
    /// Any other backend.
    Other,
}

impl BindingType {
    /// Returns the wire name of this binding type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingType::DistributedSwitch => "dvs",
            BindingType::Other => "other",
        }
    }

    /// Returns true if ports of this binding receive security rule pushes.
    pub fn is_switch_managed(&self) -> bool {
        matches!(self, BindingType::DistributedSwitch)
    }
}

impl From<String> for BindingType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dvs" => BindingType::DistributedSwitch,
            _ => BindingType::Other,
        }
    }
}

impl From<BindingType> for String {
    fn from(binding_type: BindingType) -> Self {
        binding_type.as_str().to_string()
    }
}

/// Direction a security rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    /// Traffic entering the port.
    Ingress,
    /// Traffic leaving the port.
    Egress,
}

/// Ethertype a rule or member-IP set applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ethertype {
    /// IPv4 traffic.
    #[serde(rename = "IPv4")]
    Ipv4,
    /// IPv6 traffic.
    #[serde(rename = "IPv6")]
    Ipv6,
}

impl Ethertype {
    /// Returns the wire name of this ethertype.
    pub fn as_str(&self) -> &'static str {
        match self {
            Ethertype::Ipv4 => "IPv4",
            Ethertype::Ipv6 => "IPv6",
        }
    }
}

/// A single security group rule.
///
/// `ip_set` starts empty on the wire; the diff engine populates it for
/// rules referencing a remote group before the rule reaches the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Direction the rule applies to.
    pub direction: RuleDirection,
    /// Ethertype the rule applies to.
    pub ethertype: Ethertype,
    /// IP protocol name, if restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Lower bound of the destination port range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    /// Upper bound of the destination port range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    /// Literal remote prefix the rule matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
    /// Remote security group whose members the rule matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
    /// Member IPs resolved from `remote_group_id`; populated by the
    /// diff engine, never by the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_set: Option<BTreeSet<IpAddr>>,
}

impl SecurityGroupRule {
    /// Creates a rule with no protocol or remote restrictions.
    pub fn new(direction: RuleDirection, ethertype: Ethertype) -> Self {
        Self {
            direction,
            ethertype,
            protocol: None,
            port_range_min: None,
            port_range_max: None,
            remote_ip_prefix: None,
            remote_group_id: None,
            ip_set: None,
        }
    }

    /// Restricts the rule to a protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Restricts the rule to a destination port range.
    pub fn with_port_range(mut self, min: u16, max: u16) -> Self {
        self.port_range_min = Some(min);
        self.port_range_max = Some(max);
        self
    }

    /// Points the rule at a remote security group.
    pub fn with_remote_group(mut self, group_id: impl Into<String>) -> Self {
        self.remote_group_id = Some(group_id.into());
        self
    }

    /// Points the rule at a literal remote prefix.
    pub fn with_remote_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.remote_ip_prefix = Some(prefix.into());
        self
    }
}

/// Point-in-time snapshot of a port, delivered with each port event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    /// Control-plane port id.
    pub id: String,
    /// Administrative state; toggling it blocks/unblocks the switch port.
    pub admin_state_up: bool,
    /// Security groups the port belongs to.
    #[serde(default)]
    pub security_groups: BTreeSet<String>,
    /// Backend managing the port.
    pub binding_type: BindingType,
    /// Operational status.
    pub status: PortStatus,
    /// Rules already attached to this snapshot by the control plane.
    #[serde(default)]
    pub security_group_rules: Vec<SecurityGroupRule>,
}

impl PortState {
    /// Creates an active, admin-up, switch-managed port with no groups.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin_state_up: true,
            security_groups: BTreeSet::new(),
            binding_type: BindingType::DistributedSwitch,
            status: PortStatus::Active,
            security_group_rules: Vec::new(),
        }
    }

    /// Sets the administrative state.
    pub fn with_admin_state_up(mut self, up: bool) -> Self {
        self.admin_state_up = up;
        self
    }

    /// Sets the security group membership.
    pub fn with_security_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the binding type.
    pub fn with_binding_type(mut self, binding_type: BindingType) -> Self {
        self.binding_type = binding_type;
        self
    }

    /// Sets the operational status.
    pub fn with_status(mut self, status: PortStatus) -> Self {
        self.status = status;
        self
    }
}

/// Security bundle delivered alongside port and security-group events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
    /// Ports known to the control plane, keyed by port id.
    #[serde(default)]
    pub devices: BTreeMap<String, PortState>,
    /// Rule list per security group.
    #[serde(default)]
    pub security_groups: BTreeMap<String, Vec<SecurityGroupRule>>,
    /// Member IPs per security group, split by ethertype.
    #[serde(default)]
    pub sg_member_ips: BTreeMap<String, BTreeMap<Ethertype, BTreeSet<IpAddr>>>,
}

impl SecurityGroupInfo {
    /// Returns the member IPs of `group_id` for `ethertype`.
    ///
    /// Missing groups or ethertypes yield an empty set, not an error.
    pub fn member_ips(&self, group_id: &str, ethertype: Ethertype) -> BTreeSet<IpAddr> {
        self.sg_member_ips
            .get(group_id)
            .and_then(|by_ethertype| by_ethertype.get(&ethertype))
            .cloned()
            .unwrap_or_default()
    }
}

/// Finalized per-port record pushed to the switch in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRuleSet {
    /// The port snapshot the rules apply to.
    pub port: PortState,
    /// Combined, annotated rule list across the port's security groups.
    pub rules: Vec<SecurityGroupRule>,
}

impl PortRuleSet {
    /// Returns the id of the port this record applies to.
    pub fn port_id(&self) -> &str {
        &self.port.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_network_type_as_str() {
        assert_eq!(NetworkType::Vlan.as_str(), "vlan");
        assert_eq!(NetworkType::Vxlan.as_str(), "vxlan");
        assert_eq!(NetworkType::Vlan.to_string(), "vlan");
    }

    #[test]
    fn test_vlan_segment() {
        let segment = NetworkSegment::vlan("physnet1", 100);
        assert_eq!(segment.network_type, NetworkType::Vlan);
        assert_eq!(segment.physical_network, "physnet1");
        assert_eq!(segment.segmentation_id, Some(100));
    }

    #[test]
    fn test_binding_type() {
        assert!(BindingType::DistributedSwitch.is_switch_managed());
        assert!(!BindingType::Other.is_switch_managed());
    }

    #[test]
    fn test_port_state_builder() {
        let port = PortState::new("port-1")
            .with_admin_state_up(false)
            .with_security_groups(["sg-a", "sg-b"])
            .with_status(PortStatus::Down);
        assert_eq!(port.id, "port-1");
        assert!(!port.admin_state_up);
        assert_eq!(port.security_groups.len(), 2);
        assert_eq!(port.status, PortStatus::Down);
        assert!(port.security_group_rules.is_empty());
    }

    #[test]
    fn test_member_ips_missing_group_is_empty() {
        let info = SecurityGroupInfo::default();
        assert!(info.member_ips("sg-a", Ethertype::Ipv4).is_empty());
    }

    #[test]
    fn test_member_ips_lookup() {
        let mut info = SecurityGroupInfo::default();
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        info.sg_member_ips
            .entry("sg-a".to_string())
            .or_default()
            .entry(Ethertype::Ipv4)
            .or_default()
            .insert(ip);

        assert_eq!(info.member_ips("sg-a", Ethertype::Ipv4).len(), 1);
        assert!(info.member_ips("sg-a", Ethertype::Ipv6).is_empty());
    }

    #[test]
    fn test_port_state_deserializes_wire_payload() {
        let payload = r#"{
            "id": "port-1",
            "admin_state_up": true,
            "security_groups": ["sg-a"],
            "binding_type": "dvs",
            "status": "ACTIVE"
        }"#;
        let port: PortState = serde_json::from_str(payload).unwrap();
        assert_eq!(port.binding_type, BindingType::DistributedSwitch);
        assert_eq!(port.status, PortStatus::Active);
        assert!(port.security_group_rules.is_empty());
    }

    #[test]
    fn test_unknown_binding_type_maps_to_other() {
        let payload = r#"{
            "id": "port-2",
            "admin_state_up": true,
            "binding_type": "ovs",
            "status": "DOWN"
        }"#;
        let port: PortState = serde_json::from_str(payload).unwrap();
        assert_eq!(port.binding_type, BindingType::Other);
    }

    #[test]
    fn test_rule_builder() {
        let rule = SecurityGroupRule::new(RuleDirection::Ingress, Ethertype::Ipv4)
            .with_protocol("tcp")
            .with_port_range(80, 443)
            .with_remote_group("sg-web");
        assert_eq!(rule.protocol.as_deref(), Some("tcp"));
        assert_eq!(rule.port_range_min, Some(80));
        assert_eq!(rule.port_range_max, Some(443));
        assert_eq!(rule.remote_group_id.as_deref(), Some("sg-web"));
        assert!(rule.ip_set.is_none());
    }
}
