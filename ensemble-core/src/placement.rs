use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static EMPTY_STATE_MAP: BTreeMap<String, String> = BTreeMap::new();
static EMPTY_MESSAGE_MAP: BTreeMap<String, Message> = BTreeMap::new();
static EMPTY_PREFERENCE_LIST: Vec<String> = Vec::new();

/// Instance-to-state assignments for every partition of one resource.
///
/// Ordered maps keep iteration deterministic, which the throttling pass
/// relies on: re-running a tick on identical inputs must produce an
/// identical placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStateMap {
    resource: String,
    states: BTreeMap<String, BTreeMap<String, String>>,
}

impl PartitionStateMap {
    pub fn new(resource: impl Into<String>) -> Self {
        PartitionStateMap {
            resource: resource.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn set_state(&mut self, partition: &str, instance: &str, state: impl Into<String>) {
        self.states
            .entry(partition.to_string())
            .or_default()
            .insert(instance.to_string(), state.into());
    }

    /// Replaces the whole state map of one partition.
    pub fn set_partition(&mut self, partition: &str, state_map: BTreeMap<String, String>) {
        self.states.insert(partition.to_string(), state_map);
    }

    pub fn contains(&self, partition: &str, instance: &str) -> bool {
        self.states
            .get(partition)
            .is_some_and(|m| m.contains_key(instance))
    }

    /// Instance-to-state map of one partition; empty if the partition has no
    /// assignments yet.
    pub fn partition_map(&self, partition: &str) -> &BTreeMap<String, String> {
        self.states.get(partition).unwrap_or(&EMPTY_STATE_MAP)
    }

    pub fn partitions(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.states.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Observed replica states plus in-flight transitions, per resource and
/// partition. Supplied by the external snapshot and read-only for the pass.
#[derive(Debug, Clone, Default)]
pub struct CurrentPlacement {
    states: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
    pending: BTreeMap<String, BTreeMap<String, BTreeMap<String, Message>>>,
}

impl CurrentPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_state(
        &mut self,
        resource: &str,
        partition: &str,
        instance: &str,
        state: impl Into<String>,
    ) {
        self.states
            .entry(resource.to_string())
            .or_default()
            .entry(partition.to_string())
            .or_default()
            .insert(instance.to_string(), state.into());
    }

    /// Records an in-flight transition, keyed by its target instance.
    pub fn set_pending_message(&mut self, resource: &str, partition: &str, message: Message) {
        self.pending
            .entry(resource.to_string())
            .or_default()
            .entry(partition.to_string())
            .or_default()
            .insert(message.target_instance.clone(), message);
    }

    pub fn current_state_map(&self, resource: &str, partition: &str) -> &BTreeMap<String, String> {
        self.states
            .get(resource)
            .and_then(|m| m.get(partition))
            .unwrap_or(&EMPTY_STATE_MAP)
    }

    pub fn pending_messages(&self, resource: &str, partition: &str) -> &BTreeMap<String, Message> {
        self.pending
            .get(resource)
            .and_then(|m| m.get(partition))
            .unwrap_or(&EMPTY_MESSAGE_MAP)
    }
}

/// The optimizer's ideal assignment plus the per-partition preference lists
/// used for deterministic tie-breaks.
#[derive(Debug, Clone, Default)]
pub struct TargetPlacement {
    resources: BTreeMap<String, PartitionStateMap>,
    preference_lists: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl TargetPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_partition_state_map(&mut self, map: PartitionStateMap) {
        self.resources.insert(map.resource().to_string(), map);
    }

    pub fn set_preference_list(&mut self, resource: &str, partition: &str, list: Vec<String>) {
        self.preference_lists
            .entry(resource.to_string())
            .or_default()
            .insert(partition.to_string(), list);
    }

    pub fn contains_resource(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    pub fn partition_state_map(&self, resource: &str) -> Option<&PartitionStateMap> {
        self.resources.get(resource)
    }

    /// Ordered candidate instances for one partition; empty when the
    /// optimizer supplied none.
    pub fn preference_list(&self, resource: &str, partition: &str) -> &[String] {
        self.preference_lists
            .get(resource)
            .and_then(|m| m.get(partition))
            .unwrap_or(&EMPTY_PREFERENCE_LIST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_state_map_set_and_get() {
        let mut map = PartitionStateMap::new("orders");
        map.set_state("orders_0", "host-1", "MASTER");
        map.set_state("orders_0", "host-2", "SLAVE");

        assert!(map.contains("orders_0", "host-1"));
        assert!(!map.contains("orders_0", "host-3"));
        assert_eq!(
            map.partition_map("orders_0").get("host-2"),
            Some(&"SLAVE".to_string())
        );
        assert!(map.partition_map("orders_1").is_empty());
    }

    #[test]
    fn test_current_placement_empty_fallbacks() {
        let placement = CurrentPlacement::new();
        assert!(placement.current_state_map("orders", "orders_0").is_empty());
        assert!(placement.pending_messages("orders", "orders_0").is_empty());
    }

    #[test]
    fn test_pending_message_keyed_by_target_instance() {
        let mut placement = CurrentPlacement::new();
        placement.set_pending_message(
            "orders",
            "orders_0",
            Message::new("msg-1", "OFFLINE", "SLAVE", "host-2"),
        );

        let pending = placement.pending_messages("orders", "orders_0");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get("host-2").unwrap().to_state, "SLAVE");
    }

    #[test]
    fn test_target_placement_preference_list_fallback() {
        let mut target = TargetPlacement::new();
        target.set_preference_list("orders", "orders_0", vec!["host-1".to_string()]);

        assert_eq!(target.preference_list("orders", "orders_0").len(), 1);
        assert!(target.preference_list("orders", "orders_1").is_empty());
        assert!(!target.contains_resource("orders"));
    }
}
