//! Deterministic orderings: resource prioritization, pending-message
//! ordering, and the partition urgency comparator.

use ensemble_core::{ClusterSnapshot, Message, Resource, StateModelDefinition};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Resources may compete for shared cluster and instance quota; processing
/// order decides who claims it first.
struct ResourcePriority {
    name: String,
    priority: i64,
}

/// Orders resources descending by their numeric priority field.
///
/// The priority value is read from the resource config first, then from the
/// ideal state. Absent or non-parseable values keep the sentinel minimum, so
/// those resources sort last. When no priority field is configured all
/// resources stay in input order.
pub(crate) fn prioritize_resources(
    resources: &BTreeMap<String, Resource>,
    snapshot: &ClusterSnapshot,
) -> Vec<String> {
    let mut prioritized: Vec<ResourcePriority> = resources
        .keys()
        .map(|name| ResourcePriority {
            name: name.clone(),
            priority: i64::MIN,
        })
        .collect();

    if let Some(field) = snapshot.config().resource_priority_field.as_deref() {
        for entry in &mut prioritized {
            let raw = snapshot
                .resource_property(&entry.name, field)
                .or_else(|| {
                    snapshot
                        .ideal_state(&entry.name)
                        .and_then(|ideal| ideal.property(field))
                });
            if let Some(raw) = raw {
                match raw.parse::<i64>() {
                    Ok(priority) => entry.priority = priority,
                    Err(_) => warn!(
                        resource = %entry.name,
                        priority = %raw,
                        "invalid resource priority value; treating resource as lowest priority"
                    ),
                }
            }
        }
        // Stable sort: equal priorities keep their input order
        prioritized.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    prioritized.into_iter().map(|entry| entry.name).collect()
}

/// Orders pending messages for deterministic charging:
/// higher-priority target state first, then preference-list rank of the
/// target instance, then instance name. States missing from the model and
/// instances missing from the preference list sort last instead of failing.
pub(crate) fn compare_messages(
    a: &Message,
    b: &Message,
    preference_list: &[String],
    model: &StateModelDefinition,
) -> Ordering {
    let rank = |instance: &str| {
        preference_list
            .iter()
            .position(|p| p == instance)
            .unwrap_or(usize::MAX)
    };
    let priority = |state: &str| model.state_priority(state).unwrap_or(usize::MAX);

    priority(&a.to_state)
        .cmp(&priority(&b.to_state))
        .then_with(|| rank(&a.target_instance).cmp(&rank(&b.target_instance)))
        .then_with(|| a.target_instance.cmp(&b.target_instance))
}

/// Deterministic partition ordering for display and debugging: partitions
/// missing their top state first, then fewer active replicas, then fewer
/// replicas already matching the target. Not required for throttling
/// correctness.
pub fn compare_partition_urgency(
    a: &str,
    b: &str,
    current: &BTreeMap<String, BTreeMap<String, String>>,
    target: &BTreeMap<String, BTreeMap<String, String>>,
    top_state: &str,
) -> Ordering {
    let has_top = |partition: &str| -> usize {
        let held = current
            .get(partition)
            .is_some_and(|m| m.values().any(|s| s == top_state));
        usize::from(held)
    };
    has_top(a)
        .cmp(&has_top(b))
        .then_with(|| active_replicas(a, current, target).cmp(&active_replicas(b, current, target)))
        .then_with(|| target_matches(a, current, target).cmp(&target_matches(b, current, target)))
}

/// Replicas whose current state fills some slot of the target's state
/// multiset, regardless of which instance holds it.
fn active_replicas(
    partition: &str,
    current: &BTreeMap<String, BTreeMap<String, String>>,
    target: &BTreeMap<String, BTreeMap<String, String>>,
) -> usize {
    let Some(current_map) = current.get(partition) else {
        return 0;
    };
    let mut wanted: BTreeMap<&str, usize> = BTreeMap::new();
    if let Some(target_map) = target.get(partition) {
        for state in target_map.values() {
            *wanted.entry(state.as_str()).or_insert(0) += 1;
        }
    }

    let mut active = 0;
    for state in current_map.values() {
        if let Some(count) = wanted.get_mut(state.as_str()) {
            if *count > 0 {
                active += 1;
                *count -= 1;
            }
        }
    }
    active
}

/// Replicas already in the exact state the target assigns to their instance.
fn target_matches(
    partition: &str,
    current: &BTreeMap<String, BTreeMap<String, String>>,
    target: &BTreeMap<String, BTreeMap<String, String>>,
) -> usize {
    let Some(current_map) = current.get(partition) else {
        return 0;
    };
    target
        .get(partition)
        .map(|target_map| {
            target_map
                .iter()
                .filter(|(instance, state)| current_map.get(*instance) == Some(*state))
                .count()
        })
        .unwrap_or(0)
}
