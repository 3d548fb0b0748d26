use crate::rebalance::RebalanceType;
use serde::{Deserialize, Serialize};

/// Per-category transition limits for one throttle scope.
///
/// A missing or zero limit leaves that category unthrottled at the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLimits {
    #[serde(default)]
    pub recovery_balance: Option<u64>,
    #[serde(default)]
    pub load_balance: Option<u64>,
}

impl ScopeLimits {
    /// Effective limit for a rebalance category; `None` means unthrottled.
    pub fn limit(&self, rebalance_type: RebalanceType) -> Option<u64> {
        let raw = match rebalance_type {
            RebalanceType::RecoveryBalance => self.recovery_balance,
            RebalanceType::LoadBalance => self.load_balance,
        };
        raw.filter(|limit| *limit > 0)
    }
}

/// Cluster-wide knobs consumed by the intermediate-state pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Master switch for transition throttling. When false the pass returns
    /// target placements unchanged.
    #[serde(default = "default_throttle_enabled")]
    pub throttle_enabled: bool,

    /// Limits charged once per transition across the whole cluster.
    #[serde(default)]
    pub cluster_limits: ScopeLimits,

    /// Limits applied to each resource independently.
    #[serde(default)]
    pub resource_limits: ScopeLimits,

    /// Limits applied to each instance independently.
    #[serde(default)]
    pub instance_limits: ScopeLimits,

    /// Hard cap on non-dropped replicas per instance; unset or zero disables
    /// the capacity guard.
    #[serde(default)]
    pub max_partitions_per_instance: Option<u32>,

    /// Simple-field name consulted for resource priority ordering; unset
    /// keeps resources in input order.
    #[serde(default)]
    pub resource_priority_field: Option<String>,

    /// Combined unhealthy-partition threshold above which only downward load
    /// balance is allowed. When set, partitions needing recovery count
    /// toward the total alongside partitions with ERROR replicas.
    #[serde(default)]
    pub error_or_recovery_threshold_for_load: Option<usize>,

    /// Older error-only threshold, honored when the combined one is unset.
    #[serde(default)]
    pub error_threshold_for_load: Option<usize>,
}

fn default_throttle_enabled() -> bool {
    true
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            throttle_enabled: true,
            cluster_limits: ScopeLimits::default(),
            resource_limits: ScopeLimits::default(),
            instance_limits: ScopeLimits::default(),
            max_partitions_per_instance: None,
            resource_priority_field: None,
            error_or_recovery_threshold_for_load: None,
            error_threshold_for_load: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_config_defaults() {
        let config = ControlConfig::default();
        assert!(config.throttle_enabled);
        assert_eq!(config.max_partitions_per_instance, None);
        assert_eq!(config.resource_priority_field, None);
        assert_eq!(config.cluster_limits, ScopeLimits::default());
    }

    #[test]
    fn test_zero_limit_is_unthrottled() {
        let limits = ScopeLimits {
            recovery_balance: Some(0),
            load_balance: Some(3),
        };
        assert_eq!(limits.limit(RebalanceType::RecoveryBalance), None);
        assert_eq!(limits.limit(RebalanceType::LoadBalance), Some(3));
        assert_eq!(
            ScopeLimits::default().limit(RebalanceType::LoadBalance),
            None
        );
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ControlConfig = serde_json::from_str(
            r#"{
                "cluster_limits": {"recovery_balance": 5},
                "max_partitions_per_instance": 100,
                "resource_priority_field": "PRIORITY"
            }"#,
        )
        .unwrap();

        assert!(config.throttle_enabled);
        assert_eq!(
            config.cluster_limits.limit(RebalanceType::RecoveryBalance),
            Some(5)
        );
        assert_eq!(config.cluster_limits.limit(RebalanceType::LoadBalance), None);
        assert_eq!(config.max_partitions_per_instance, Some(100));
        assert_eq!(config.resource_priority_field.as_deref(), Some("PRIORITY"));
    }
}
