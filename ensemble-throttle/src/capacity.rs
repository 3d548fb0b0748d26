//! Post-pass capacity guard: rejects a tick whose aggregate placement would
//! put more replicas on an instance than the configured maximum.

use crate::errors::{Result, ThrottleError};
use crate::stage::IntermediatePlacement;
use ensemble_core::{
    ClusterSnapshot, MaintenanceHandle, RebalanceMonitor, RebalanceStatus, DROPPED_STATE,
    TASK_MODEL_NAME,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Walks the full intermediate placement counting non-dropped replicas per
/// instance. The first instance found over the limit halts the tick: the
/// caller must not dispatch any transition derived from this result, and
/// cluster maintenance mode is requested (once, if not already active).
///
/// Running after the merge rather than per resource keeps the check against
/// the complete mapping, which is the only view where the per-instance
/// totals are meaningful.
pub(crate) fn validate_max_partitions_per_instance(
    snapshot: &ClusterSnapshot,
    output: &IntermediatePlacement,
    limit: u32,
    maintenance: &dyn MaintenanceHandle,
    monitor: Option<&dyn RebalanceMonitor>,
) -> Result<()> {
    let mut replica_counts: BTreeMap<&str, u32> = BTreeMap::new();

    for (resource_name, placement) in &output.placements {
        // Task-framework resources have their own throttling and are exempt
        let is_task_resource = snapshot
            .ideal_state(resource_name)
            .is_some_and(|ideal| ideal.state_model_ref == TASK_MODEL_NAME);
        if is_task_resource {
            continue;
        }

        for (partition, state_map) in placement.partitions() {
            for (instance, state) in state_map {
                // Replicas on their way out do not occupy capacity
                if state == DROPPED_STATE {
                    continue;
                }
                let count = replica_counts.entry(instance.as_str()).or_insert(0);
                *count += 1;
                if *count > limit {
                    let reason = format!(
                        "instance {instance} holds more replicas/partitions than the maximum \
                         allowed ({limit}); stopping rebalance and putting the cluster into \
                         maintenance mode (resource {resource_name})"
                    );
                    if !maintenance.in_maintenance() {
                        maintenance.enable_maintenance(&reason);
                    }
                    warn!(
                        instance = %instance,
                        limit,
                        resource = %resource_name,
                        partition = %partition,
                        "assignment exceeds max partitions per instance"
                    );
                    if let Some(monitor) = monitor {
                        monitor.set_rebalance_status(
                            std::slice::from_ref(resource_name),
                            RebalanceStatus::IntermediateStateFailed,
                        );
                    }
                    return Err(ThrottleError::CapacityExceeded {
                        instance: instance.clone(),
                        limit,
                        resource: resource_name.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}
