//! The intermediate-state pass: computes, for one control-loop tick, the
//! placement the cluster should converge toward next, as close to the target
//! placement as the transition throttles allow.

use crate::classify;
use crate::errors::{Result, ThrottleError};
use crate::ledger::ThrottleLedger;
use crate::ordering;
use ensemble_core::{
    ClusterSnapshot, CurrentPlacement, IdealState, MaintenanceHandle, PartitionStateMap,
    RebalanceMode, RebalanceMonitor, RebalanceStats, RebalanceStatus, RebalanceType, Resource,
    StateModelDefinition, TargetPlacement, ERROR_STATE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Everything one tick consumes. All inputs are read-only snapshots
/// pre-fetched by the control loop; any missing input aborts the tick
/// before computation starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInputs<'a> {
    pub current: Option<&'a CurrentPlacement>,
    pub target: Option<&'a TargetPlacement>,
    pub resources: Option<&'a BTreeMap<String, Resource>>,
    pub snapshot: Option<&'a ClusterSnapshot>,
}

/// A target-placement entry denied quota this tick. The dispatch layer must
/// drop the matching not-yet-issued transition; the replica keeps its
/// current state until a later tick admits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottledReplica {
    pub resource: String,
    pub partition: String,
    pub instance: String,
    pub target_state: String,
    pub rebalance_type: RebalanceType,
}

/// Result of one intermediate-state pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IntermediatePlacement {
    /// Per-resource next-step placement. Resources that failed to compute
    /// are absent here and listed in `failed_resources` instead.
    pub placements: BTreeMap<String, PartitionStateMap>,
    /// Resources excluded from this tick because their computation failed.
    pub failed_resources: Vec<String>,
    /// Transitions denied quota; to be removed from the pending dispatch set.
    pub throttled: Vec<ThrottledReplica>,
}

impl IntermediatePlacement {
    pub fn partition_state_map(&self, resource: &str) -> Option<&PartitionStateMap> {
        self.placements.get(resource)
    }
}

/// Computes the intermediate placement for one tick.
///
/// Resources are processed in priority order; each resource is classified,
/// charged for its in-flight transitions, then granted remaining quota for
/// recovery and load balance. A failure on one resource excludes only that
/// resource. After all resources are merged, the capacity guard validates
/// the aggregate and can reject the whole tick.
pub fn compute_intermediate_placement(
    inputs: &TickInputs<'_>,
    maintenance: &dyn MaintenanceHandle,
    monitor: Option<&dyn RebalanceMonitor>,
) -> Result<IntermediatePlacement> {
    let current = inputs
        .current
        .ok_or(ThrottleError::MissingInput("current placement"))?;
    let target = inputs
        .target
        .ok_or(ThrottleError::MissingInput("target placement"))?;
    let resources = inputs
        .resources
        .ok_or(ThrottleError::MissingInput("resource set"))?;
    let snapshot = inputs
        .snapshot
        .ok_or(ThrottleError::MissingInput("cluster snapshot"))?;

    let mut ledger = ThrottleLedger::new(snapshot.config());
    let mut output = IntermediatePlacement::default();

    for resource_name in ordering::prioritize_resources(resources, snapshot) {
        let Some(resource) = resources.get(&resource_name) else {
            continue;
        };
        let Some(target_map) = target.partition_state_map(&resource_name) else {
            info!(
                resource = %resource_name,
                "skipping intermediate state: target placement not available"
            );
            continue;
        };

        // A missing ideal state means the resource may no longer exist; a
        // default (non-full-auto) entry yields passthrough below.
        let fallback_ideal;
        let ideal = match snapshot.ideal_state(&resource_name) {
            Some(ideal) => ideal,
            None => {
                info!(
                    resource = %resource_name,
                    "ideal state does not exist; resource may no longer exist"
                );
                fallback_ideal =
                    IdealState::new(resource_name.clone(), resource.state_model_ref.clone());
                &fallback_ideal
            }
        };

        match compute_resource_intermediate(
            snapshot,
            ideal,
            resource,
            current,
            target,
            target_map,
            &mut ledger,
            monitor,
            &mut output.throttled,
        ) {
            Ok(placement) => {
                output.placements.insert(resource_name, placement);
            }
            Err(error) => {
                warn!(
                    resource = %resource_name,
                    error = %error,
                    "failed to compute intermediate state for resource"
                );
                output.failed_resources.push(resource_name);
            }
        }
    }

    if let Some(monitor) = monitor {
        monitor.set_rebalance_status(
            &output.failed_resources,
            RebalanceStatus::IntermediateStateFailed,
        );
        let computed: Vec<String> = output.placements.keys().cloned().collect();
        monitor.set_rebalance_status(&computed, RebalanceStatus::Normal);
    }

    if let Some(limit) = snapshot
        .config()
        .max_partitions_per_instance
        .filter(|limit| *limit > 0)
    {
        crate::capacity::validate_max_partitions_per_instance(
            snapshot,
            &output,
            limit,
            maintenance,
            monitor,
        )?;
    }

    Ok(output)
}

#[allow(clippy::too_many_arguments)]
fn compute_resource_intermediate(
    snapshot: &ClusterSnapshot,
    ideal: &IdealState,
    resource: &Resource,
    current: &CurrentPlacement,
    target: &TargetPlacement,
    target_map: &PartitionStateMap,
    ledger: &mut ThrottleLedger,
    monitor: Option<&dyn RebalanceMonitor>,
    throttled_out: &mut Vec<ThrottledReplica>,
) -> Result<PartitionStateMap> {
    let resource_name = resource.name.as_str();
    debug!(resource = %resource_name, "processing resource");

    // Throttling applies only to fully automated resources
    if !ledger.is_enabled() || ideal.rebalance_mode != RebalanceMode::FullAuto {
        return Ok(target_map.clone());
    }

    let model = snapshot.state_model(&ideal.state_model_ref).ok_or_else(|| {
        ThrottleError::UnknownStateModel {
            resource: resource_name.to_string(),
            model: ideal.state_model_ref.clone(),
        }
    })?;

    let mut intermediate = PartitionStateMap::new(resource_name);
    let mut need_recovery = BTreeSet::new();
    let mut need_load = BTreeSet::new();
    let mut with_error_replica = BTreeSet::new();

    for partition in &resource.partitions {
        let current_map = current.current_state_map(resource_name, partition);
        let desired_map = target_map.partition_map(partition);
        let preference = target.preference_list(resource_name, partition);

        if current_map.values().any(|state| state == ERROR_STATE) {
            with_error_replica.insert(partition.clone());
        }

        match classify::classify_partition(
            snapshot,
            ideal,
            model,
            partition,
            current_map,
            desired_map,
            preference,
        ) {
            Some(RebalanceType::RecoveryBalance) if current_map != desired_map => {
                need_recovery.insert(partition.clone());
            }
            Some(RebalanceType::LoadBalance) => {
                need_load.insert(partition.clone());
            }
            // Already at target (or recovery-classified with nothing to
            // move); carry the target forward untouched
            _ => intermediate.set_partition(partition, desired_map.clone()),
        }
    }

    if !need_recovery.is_empty() {
        info!(resource = %resource_name, partitions = ?need_recovery, "recovery balance needed");
    }
    if !need_load.is_empty() {
        info!(resource = %resource_name, partitions = ?need_load, "load balance needed");
    }
    if !with_error_replica.is_empty() {
        info!(
            resource = %resource_name,
            partitions = ?with_error_replica,
            "partitions currently hold an ERROR replica"
        );
    }

    charge_pending_transitions(
        snapshot,
        ideal,
        resource,
        model,
        current,
        target,
        ledger,
        &mut intermediate,
    );

    let recovery_throttled = rebalance_partitions(
        RebalanceType::RecoveryBalance,
        &need_recovery,
        false,
        snapshot,
        model,
        resource_name,
        current,
        target_map,
        ledger,
        &mut intermediate,
        throttled_out,
    );

    // When too many partitions are unhealthy, load balance may only shed
    // work: the combined threshold counts recovery partitions too, the
    // legacy threshold counts ERROR replicas only.
    let config = snapshot.config();
    let mut unhealthy = with_error_replica.len();
    let threshold = match config.error_or_recovery_threshold_for_load {
        Some(threshold) => {
            unhealthy += need_recovery.len();
            threshold
        }
        None => config.error_threshold_for_load.unwrap_or(1),
    };
    let only_downward = unhealthy > threshold;
    if only_downward {
        info!(
            resource = %resource_name,
            unhealthy, threshold,
            "unhealthy partition count exceeds threshold; only downward load balance allowed"
        );
    }

    let load_throttled = rebalance_partitions(
        RebalanceType::LoadBalance,
        &need_load,
        only_downward,
        snapshot,
        model,
        resource_name,
        current,
        target_map,
        ledger,
        &mut intermediate,
        throttled_out,
    );

    if let Some(monitor) = monitor {
        monitor.update_rebalance_stats(
            resource_name,
            RebalanceStats {
                recovery_partitions: need_recovery.len(),
                load_balance_partitions: need_load.len(),
                recovery_throttled: recovery_throttled.len(),
                load_balance_throttled: load_throttled.len(),
            },
        );
    }

    debug!(resource = %resource_name, "end processing resource");
    Ok(intermediate)
}

/// Replays in-flight transitions against the ledger and pins their target
/// states into the intermediate placement.
///
/// Charging here is unconditional bookkeeping of quota a prior tick already
/// spent, never an admission decision: suppressing an already-dispatched
/// transition would be unsafe, so every pending target state is carried
/// forward verbatim.
#[allow(clippy::too_many_arguments)]
fn charge_pending_transitions(
    snapshot: &ClusterSnapshot,
    ideal: &IdealState,
    resource: &Resource,
    model: &StateModelDefinition,
    current: &CurrentPlacement,
    target: &TargetPlacement,
    ledger: &mut ThrottleLedger,
    intermediate: &mut PartitionStateMap,
) {
    let resource_name = resource.name.as_str();
    for partition in &resource.partitions {
        let preference = target.preference_list(resource_name, partition);
        let required = classify::required_state_counts(
            model,
            ideal,
            preference,
            snapshot.enabled_live_instances(),
        );
        let current_map = current.current_state_map(resource_name, partition);
        let disabled = snapshot.disabled_instances_for_partition(resource_name, partition);

        let mut pending: Vec<_> = current
            .pending_messages(resource_name, partition)
            .values()
            .collect();
        pending.sort_by(|a, b| ordering::compare_messages(a, b, preference, model));

        for message in pending {
            let rebalance_type = classify::classify_message(&required, message, current_map);
            let instance_state = current_map.get(&message.target_instance);

            // Charge only transitions still in flight: the target state has
            // not been reached, the source state has not been superseded,
            // and the instance is not disabled for this partition
            if instance_state != Some(&message.to_state)
                && instance_state == Some(&message.from_state)
                && !disabled.contains(&message.target_instance)
            {
                ledger.charge_instance(rebalance_type, &message.target_instance);
                ledger.charge_resource(rebalance_type, resource_name);
                ledger.charge_cluster(rebalance_type);
            }

            intermediate.set_state(
                partition,
                &message.target_instance,
                message.to_state.clone(),
            );
        }
    }
}

/// Admits partitions of one rebalance category against the remaining quota.
///
/// Admission is a partition-level decision charged once per partition; the
/// individual writes stay entry-level so states pinned by pending
/// transitions are never overwritten. Returns the partitions that were
/// throttled.
#[allow(clippy::too_many_arguments)]
fn rebalance_partitions(
    rebalance_type: RebalanceType,
    partitions: &BTreeSet<String>,
    only_downward: bool,
    snapshot: &ClusterSnapshot,
    model: &StateModelDefinition,
    resource_name: &str,
    current: &CurrentPlacement,
    target_map: &PartitionStateMap,
    ledger: &mut ThrottleLedger,
    intermediate: &mut PartitionStateMap,
    throttled_out: &mut Vec<ThrottledReplica>,
) -> BTreeSet<String> {
    let mut throttled_partitions = BTreeSet::new();

    for partition in partitions {
        let current_map = current.current_state_map(resource_name, partition);
        let desired_map = target_map.partition_map(partition);
        let disabled = snapshot.disabled_instances_for_partition(resource_name, partition);

        // Entries still needing an actual transition, i.e. not pinned by a
        // pending message and not already in the desired state
        let mut changes: Vec<(&String, &String)> = Vec::new();
        for (instance, desired) in desired_map {
            if intermediate.contains(partition, instance) {
                continue;
            }
            if current_map.get(instance) == Some(desired) {
                // Carrying a replica forward is not a transition
                intermediate.set_state(partition, instance, desired.clone());
                continue;
            }
            changes.push((instance, desired));
        }

        if only_downward {
            // Downward transitions relinquish resources and bypass the
            // budget entirely; everything else is suppressed while the
            // resource is unhealthy
            for (instance, desired) in changes {
                let from_state = current_map.get(instance).map(String::as_str);
                if classify::is_downward_transition(model, from_state, desired) {
                    intermediate.set_state(partition, instance, desired.clone());
                } else {
                    throttled_partitions.insert(partition.clone());
                    throttled_out.push(ThrottledReplica {
                        resource: resource_name.to_string(),
                        partition: partition.clone(),
                        instance: instance.clone(),
                        target_state: desired.clone(),
                        rebalance_type,
                    });
                }
            }
        } else if !changes.is_empty() {
            // Resource scope (with the cluster-wide budget) is checked
            // before instance scope; instances disabled for the partition
            // skip the instance check
            let mut admitted = ledger.may_charge_cluster(rebalance_type)
                && ledger.may_charge_resource(rebalance_type, resource_name);
            if admitted {
                admitted = changes.iter().all(|(instance, _)| {
                    disabled.contains(*instance)
                        || ledger.may_charge_instance(rebalance_type, instance)
                });
            }

            if admitted {
                ledger.charge_cluster(rebalance_type);
                ledger.charge_resource(rebalance_type, resource_name);
                for (instance, desired) in changes {
                    intermediate.set_state(partition, instance, desired.clone());
                }
            } else {
                debug!(
                    resource = %resource_name,
                    partition = %partition,
                    ?rebalance_type,
                    "partition throttled: transition quota exhausted"
                );
                throttled_partitions.insert(partition.clone());
                for (instance, desired) in changes {
                    throttled_out.push(ThrottledReplica {
                        resource: resource_name.to_string(),
                        partition: partition.clone(),
                        instance: instance.clone(),
                        target_state: desired.clone(),
                        rebalance_type,
                    });
                }
            }
        }

        // Untouched replicas keep their current state this tick
        for (instance, state) in current_map {
            if !intermediate.contains(partition, instance) {
                intermediate.set_state(partition, instance, state.clone());
            }
        }
    }

    throttled_partitions
}
