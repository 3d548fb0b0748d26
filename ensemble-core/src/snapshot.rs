use crate::config::ControlConfig;
use crate::ideal_state::IdealState;
use crate::state_model::StateModelDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

static EMPTY_INSTANCE_SET: BTreeSet<String> = BTreeSet::new();

/// One resource to rebalance this tick: a named collection of partitions
/// governed by a state model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub state_model_ref: String,
    pub partitions: Vec<String>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        state_model_ref: impl Into<String>,
        partitions: Vec<String>,
    ) -> Self {
        Resource {
            name: name.into(),
            state_model_ref: state_model_ref.into(),
            partitions,
        }
    }
}

/// Read-only cluster metadata captured at the start of a tick.
///
/// The live metadata cache is mutable and shared; a pass never sees it
/// directly. The control loop snapshots what the pass needs into this struct
/// so the whole computation runs against one immutable view.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    ideal_states: BTreeMap<String, IdealState>,
    state_models: BTreeMap<String, StateModelDefinition>,
    enabled_live_instances: BTreeSet<String>,
    // resource -> partition -> instances disabled for that partition
    disabled_instances: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    // resource-config simple fields, consulted before ideal-state properties
    resource_properties: BTreeMap<String, BTreeMap<String, String>>,
    config: ControlConfig,
}

impl ClusterSnapshot {
    pub fn new(config: ControlConfig) -> Self {
        ClusterSnapshot {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn add_ideal_state(&mut self, ideal_state: IdealState) {
        self.ideal_states
            .insert(ideal_state.resource_name.clone(), ideal_state);
    }

    pub fn ideal_state(&self, resource: &str) -> Option<&IdealState> {
        self.ideal_states.get(resource)
    }

    pub fn add_state_model(&mut self, model: StateModelDefinition) {
        self.state_models.insert(model.name().to_string(), model);
    }

    pub fn state_model(&self, name: &str) -> Option<&StateModelDefinition> {
        self.state_models.get(name)
    }

    pub fn add_live_instance(&mut self, instance: impl Into<String>) {
        self.enabled_live_instances.insert(instance.into());
    }

    /// Instances that are both administratively enabled and currently live.
    pub fn enabled_live_instances(&self) -> &BTreeSet<String> {
        &self.enabled_live_instances
    }

    pub fn disable_instance_for_partition(
        &mut self,
        resource: &str,
        partition: &str,
        instance: impl Into<String>,
    ) {
        self.disabled_instances
            .entry(resource.to_string())
            .or_default()
            .entry(partition.to_string())
            .or_default()
            .insert(instance.into());
    }

    pub fn disabled_instances_for_partition(
        &self,
        resource: &str,
        partition: &str,
    ) -> &BTreeSet<String> {
        self.disabled_instances
            .get(resource)
            .and_then(|m| m.get(partition))
            .unwrap_or(&EMPTY_INSTANCE_SET)
    }

    pub fn set_resource_property(
        &mut self,
        resource: &str,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.resource_properties
            .entry(resource.to_string())
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Resource-config simple field, e.g. a priority override.
    pub fn resource_property(&self, resource: &str, field: &str) -> Option<&str> {
        self.resource_properties
            .get(resource)
            .and_then(|m| m.get(field))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_instances_fallback() {
        let mut snapshot = ClusterSnapshot::new(ControlConfig::default());
        snapshot.disable_instance_for_partition("orders", "orders_0", "host-3");

        assert!(snapshot
            .disabled_instances_for_partition("orders", "orders_0")
            .contains("host-3"));
        assert!(snapshot
            .disabled_instances_for_partition("orders", "orders_1")
            .is_empty());
    }

    #[test]
    fn test_resource_property_lookup() {
        let mut snapshot = ClusterSnapshot::new(ControlConfig::default());
        snapshot.set_resource_property("orders", "PRIORITY", "7");

        assert_eq!(snapshot.resource_property("orders", "PRIORITY"), Some("7"));
        assert_eq!(snapshot.resource_property("orders", "OTHER"), None);
        assert_eq!(snapshot.resource_property("users", "PRIORITY"), None);
    }
}
