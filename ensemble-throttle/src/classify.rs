//! Rebalance classification: decides whether a partition (or a single
//! pending message) represents recovery work or load-balance work.

use ensemble_core::state_model::state_counts;
use ensemble_core::{
    ClusterSnapshot, IdealState, Message, RebalanceType, StateModelDefinition, DROPPED_STATE,
    ERROR_STATE,
};
use std::collections::{BTreeMap, BTreeSet};

/// Required replica count per state for one partition, restricted to the
/// preference-list candidates that are enabled and live.
pub(crate) fn required_state_counts(
    model: &StateModelDefinition,
    ideal: &IdealState,
    preference_list: &[String],
    enabled_live_instances: &BTreeSet<String>,
) -> BTreeMap<String, usize> {
    let active_candidates = preference_list
        .iter()
        .filter(|instance| enabled_live_instances.contains(*instance))
        .count();
    let replica_count = ideal.required_replica_count(preference_list.len());
    model.state_count_map(active_candidates, replica_count)
}

/// Classifies one partition against its target placement.
///
/// Returns `Some(RecoveryBalance)` when a structurally required state is
/// under-replicated, `Some(LoadBalance)` when replication is satisfied but
/// the placement is not yet at target, and `None` when current equals target.
pub(crate) fn classify_partition(
    snapshot: &ClusterSnapshot,
    ideal: &IdealState,
    model: &StateModelDefinition,
    partition: &str,
    current: &BTreeMap<String, String>,
    target: &BTreeMap<String, String>,
    preference_list: &[String],
) -> Option<RebalanceType> {
    let required = required_state_counts(
        model,
        ideal,
        preference_list,
        snapshot.enabled_live_instances(),
    );

    // Replicas on instances disabled for this partition cannot satisfy
    // required-state counts.
    let disabled = snapshot.disabled_instances_for_partition(&ideal.resource_name, partition);
    let mut current_enabled = current.clone();
    current_enabled.retain(|instance, _| !disabled.contains(instance));
    let actual = state_counts(&current_enabled);

    for (state, expected) in &required {
        let held = actual.get(state).copied().unwrap_or(0);
        if held < *expected
            && state != DROPPED_STATE
            && state != ERROR_STATE
            && state != model.initial_state()
        {
            // A durability-relevant replica is missing; recovery wins over
            // any load-balance consideration.
            return Some(RebalanceType::RecoveryBalance);
        }
    }

    if current == target {
        None
    } else {
        Some(RebalanceType::LoadBalance)
    }
}

/// Category a pending message is charged under: recovery when its target
/// state still fills a required-state deficit after accounting for the
/// replicas the partition already holds, load balance otherwise.
pub(crate) fn classify_message(
    required: &BTreeMap<String, usize>,
    message: &Message,
    current: &BTreeMap<String, String>,
) -> RebalanceType {
    let mut outstanding = required.clone();
    for state in current.values() {
        if let Some(count) = outstanding.get_mut(state) {
            if *count <= 1 {
                outstanding.remove(state);
            } else {
                *count -= 1;
            }
        }
    }

    if outstanding.contains_key(&message.to_state) {
        RebalanceType::RecoveryBalance
    } else {
        RebalanceType::LoadBalance
    }
}

/// True when a transition strictly steps down in state priority, i.e. it
/// relinquishes work rather than acquiring it. Unknown states cannot be
/// proven downward and return false.
pub(crate) fn is_downward_transition(
    model: &StateModelDefinition,
    from_state: Option<&str>,
    to_state: &str,
) -> bool {
    let Some(from_state) = from_state else {
        return false;
    };
    // Lower index means higher priority, so stepping down moves to a
    // larger index
    match (model.state_priority(from_state), model.state_priority(to_state)) {
        (Some(from), Some(to)) => from < to,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::{ControlConfig, StateCount};

    fn master_slave() -> StateModelDefinition {
        StateModelDefinition::new(
            "MasterSlave",
            vec![
                ("MASTER".to_string(), StateCount::Fixed(1)),
                ("SLAVE".to_string(), StateCount::Remaining),
                ("OFFLINE".to_string(), StateCount::Fixed(0)),
            ],
            "OFFLINE",
        )
    }

    fn snapshot_with_instances(instances: &[&str]) -> ClusterSnapshot {
        let mut snapshot = ClusterSnapshot::new(ControlConfig::default());
        for instance in instances {
            snapshot.add_live_instance(*instance);
        }
        snapshot.add_state_model(master_slave());
        snapshot
    }

    fn ideal() -> IdealState {
        let mut ideal = IdealState::new("orders", "MasterSlave");
        ideal.replicas = Some(2);
        ideal
    }

    fn states(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(i, s)| (i.to_string(), s.to_string()))
            .collect()
    }

    fn prefs(instances: &[&str]) -> Vec<String> {
        instances.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_missing_master_classifies_recovery() {
        let snapshot = snapshot_with_instances(&["host-a", "host-b"]);
        let model = master_slave();
        let current = states(&[("host-a", "OFFLINE")]);
        let target = states(&[("host-a", "SLAVE"), ("host-b", "MASTER")]);

        let result = classify_partition(
            &snapshot,
            &ideal(),
            &model,
            "orders_0",
            &current,
            &target,
            &prefs(&["host-a", "host-b"]),
        );
        assert_eq!(result, Some(RebalanceType::RecoveryBalance));
    }

    #[test]
    fn test_at_target_classifies_none() {
        let snapshot = snapshot_with_instances(&["host-a", "host-b"]);
        let model = master_slave();
        let placed = states(&[("host-a", "MASTER"), ("host-b", "SLAVE")]);

        let result = classify_partition(
            &snapshot,
            &ideal(),
            &model,
            "orders_1",
            &placed,
            &placed,
            &prefs(&["host-a", "host-b"]),
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_replicated_but_suboptimal_classifies_load() {
        let snapshot = snapshot_with_instances(&["host-a", "host-b"]);
        let model = master_slave();
        let current = states(&[("host-a", "SLAVE"), ("host-b", "MASTER")]);
        let target = states(&[("host-a", "MASTER"), ("host-b", "SLAVE")]);

        let result = classify_partition(
            &snapshot,
            &ideal(),
            &model,
            "orders_2",
            &current,
            &target,
            &prefs(&["host-a", "host-b"]),
        );
        assert_eq!(result, Some(RebalanceType::LoadBalance));
    }

    #[test]
    fn test_initial_state_deficit_is_not_recovery() {
        let snapshot = snapshot_with_instances(&["host-a", "host-b"]);
        let model = StateModelDefinition::new(
            "MasterOffline",
            vec![
                ("MASTER".to_string(), StateCount::Fixed(1)),
                ("OFFLINE".to_string(), StateCount::Remaining),
            ],
            "OFFLINE",
        );
        let mut ideal = IdealState::new("orders", "MasterOffline");
        ideal.replicas = Some(2);
        // Master satisfied; only the OFFLINE (initial state) count is short
        let current = states(&[("host-a", "MASTER")]);
        let target = states(&[("host-a", "MASTER"), ("host-b", "OFFLINE")]);

        let result = classify_partition(
            &snapshot,
            &ideal,
            &model,
            "orders_0",
            &current,
            &target,
            &prefs(&["host-a", "host-b"]),
        );
        assert_eq!(result, Some(RebalanceType::LoadBalance));
    }

    #[test]
    fn test_disabled_replica_does_not_satisfy_requirement() {
        let mut snapshot = snapshot_with_instances(&["host-a", "host-b"]);
        snapshot.disable_instance_for_partition("orders", "orders_0", "host-a");
        let model = master_slave();
        let placed = states(&[("host-a", "MASTER"), ("host-b", "SLAVE")]);

        let result = classify_partition(
            &snapshot,
            &ideal(),
            &model,
            "orders_0",
            &placed,
            &placed,
            &prefs(&["host-a", "host-b"]),
        );
        assert_eq!(result, Some(RebalanceType::RecoveryBalance));
    }

    #[test]
    fn test_message_filling_deficit_is_recovery() {
        let mut required = BTreeMap::new();
        required.insert("MASTER".to_string(), 1);
        required.insert("SLAVE".to_string(), 1);
        let current = states(&[("host-a", "SLAVE")]);

        let promote = Message::new("m1", "SLAVE", "MASTER", "host-b");
        assert_eq!(
            classify_message(&required, &promote, &current),
            RebalanceType::RecoveryBalance
        );

        // Slave requirement already satisfied: another slave is load balance
        let extra_slave = Message::new("m2", "OFFLINE", "SLAVE", "host-b");
        assert_eq!(
            classify_message(&required, &extra_slave, &current),
            RebalanceType::LoadBalance
        );
    }

    #[test]
    fn test_downward_transition_detection() {
        let model = master_slave();
        assert!(is_downward_transition(&model, Some("MASTER"), "SLAVE"));
        assert!(!is_downward_transition(&model, Some("SLAVE"), "MASTER"));
        assert!(!is_downward_transition(&model, Some("SLAVE"), "SLAVE"));
        // Unknown states cannot be proven downward
        assert!(!is_downward_transition(&model, Some("STANDBY"), "SLAVE"));
        assert!(!is_downward_transition(&model, None, "SLAVE"));
    }
}
