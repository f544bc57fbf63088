//! Security-group delta computation.
//!
//! Given the current and original snapshots of a port plus the security
//! bundle delivered with the event, computes the minimal set of ports whose
//! applied rules must be re-pushed, and resolves remote-group references
//! into concrete member-IP sets.
//!
//! The engine is pure: it never mutates the caller's payload. Annotated
//! rules are rebuilt into new records, and ordered collections keep the
//! output batch deterministic for a given input.

use std::collections::{BTreeMap, BTreeSet};

use dvs_agent_common::{PortRuleSet, PortState, SecurityGroupInfo, SecurityGroupRule};

/// Computes minimal security rule-push batches from incremental diffs.
#[derive(Debug, Clone, Default)]
pub struct SecurityGroupDiffEngine;

impl SecurityGroupDiffEngine {
    /// Creates a diff engine.
    pub fn new() -> Self {
        Self
    }

    /// Computes the batch of finalized port records requiring a rule push.
    ///
    /// `force` pushes the port's full current membership regardless of the
    /// original snapshot; otherwise only the symmetric difference between
    /// current and original group membership is considered. An empty batch
    /// means no switch call is needed.
    pub fn compute(
        &self,
        current: &PortState,
        original: &PortState,
        sg_info: &SecurityGroupInfo,
        force: bool,
    ) -> Vec<PortRuleSet> {
        let changed: BTreeSet<String> = if force {
            current.security_groups.clone()
        } else {
            current
                .security_groups
                .symmetric_difference(&original.security_groups)
                .cloned()
                .collect()
        };

        if changed.is_empty() && !force {
            return Vec::new();
        }

        let mut groups_to_update = BTreeSet::new();
        let mut ports_to_update = BTreeSet::new();

        // The triggering port is tracked separately by the control plane:
        // when it is absent from the device map, its changed groups drive
        // the update through group membership instead.
        if sg_info.devices.contains_key(&current.id) {
            ports_to_update.insert(current.id.clone());
        } else {
            groups_to_update.extend(changed.iter().cloned());
        }

        // Any rule matching members of a changed group invalidates its
        // owning group.
        for (group_id, rules) in &sg_info.security_groups {
            for rule in rules {
                if let Some(remote) = &rule.remote_group_id {
                    if changed.contains(remote) {
                        groups_to_update.insert(group_id.clone());
                    }
                }
            }
        }

        let annotated = self.annotate_rules(sg_info, &changed, &groups_to_update);

        for (port_id, device) in &sg_info.devices {
            if device.binding_type.is_switch_managed()
                && !device.security_groups.is_disjoint(&groups_to_update)
            {
                ports_to_update.insert(port_id.clone());
            }
        }

        ports_to_update
            .iter()
            .filter_map(|port_id| sg_info.devices.get(port_id))
            .map(|port| self.finalize_port(port, &annotated))
            .collect()
    }

    /// Rebuilds the rule table, resolving remote-group references into
    /// member-IP sets for every group that needs an update.
    fn annotate_rules(
        &self,
        sg_info: &SecurityGroupInfo,
        changed: &BTreeSet<String>,
        groups_to_update: &BTreeSet<String>,
    ) -> BTreeMap<String, Vec<SecurityGroupRule>> {
        sg_info
            .security_groups
            .iter()
            .map(|(group_id, rules)| {
                let needs_annotation =
                    changed.contains(group_id) || groups_to_update.contains(group_id);
                let rules = rules
                    .iter()
                    .map(|rule| match &rule.remote_group_id {
                        Some(remote) if needs_annotation => {
                            let mut annotated = rule.clone();
                            annotated.ip_set = Some(sg_info.member_ips(remote, rule.ethertype));
                            annotated
                        }
                        _ => rule.clone(),
                    })
                    .collect();
                (group_id.clone(), rules)
            })
            .collect()
    }

    /// Gathers the combined rule list of a port's security groups into a
    /// finalized record. Groups with no known rules contribute nothing.
    fn finalize_port(
        &self,
        port: &PortState,
        annotated: &BTreeMap<String, Vec<SecurityGroupRule>>,
    ) -> PortRuleSet {
        let mut rules = port.security_group_rules.clone();
        for group_id in &port.security_groups {
            if let Some(group_rules) = annotated.get(group_id) {
                rules.extend(group_rules.iter().cloned());
            }
        }
        PortRuleSet {
            port: port.clone(),
            rules,
        }
    }
}
