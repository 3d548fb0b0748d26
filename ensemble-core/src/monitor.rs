use crate::rebalance::RebalanceStats;

/// Rebalance outcome reported per resource after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceStatus {
    /// Intermediate state computed normally.
    Normal,
    /// Intermediate state calculation failed; the resource was excluded from
    /// the tick's result.
    IntermediateStateFailed,
}

/// Sink for pre-aggregated rebalance counters, implemented by the external
/// monitoring layer. The pass only hands over counts; aggregation windows
/// and emission are the sink's concern.
pub trait RebalanceMonitor {
    fn update_rebalance_stats(&self, resource: &str, stats: RebalanceStats);

    fn set_rebalance_status(&self, resources: &[String], status: RebalanceStatus);
}

/// Process-wide maintenance switch exposed by the external cluster
/// management API.
pub trait MaintenanceHandle {
    /// True when the cluster is already in maintenance mode.
    fn in_maintenance(&self) -> bool;

    /// Requests cluster-wide maintenance mode with a human-readable reason.
    /// Callers check `in_maintenance` first so the trigger fires at most
    /// once per maintenance period.
    fn enable_maintenance(&self, reason: &str);
}
