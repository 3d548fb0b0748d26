use ensemble_core::{ControlConfig, RebalanceType, ScopeLimits};
use std::collections::BTreeMap;

/// Per-tick quota accounting for state transitions at cluster, resource, and
/// instance scope.
///
/// A ledger is created fresh at the start of every pass and discarded with
/// it; multi-tick continuity comes from re-charging still-pending transitions
/// out of the snapshot each tick, not from carrying counters over. Counters
/// only ever increase within a tick.
#[derive(Debug)]
pub struct ThrottleLedger {
    enabled: bool,
    cluster_limits: ScopeLimits,
    resource_limits: ScopeLimits,
    instance_limits: ScopeLimits,
    cluster: ScopeCell,
    resources: BTreeMap<String, ScopeCell>,
    instances: BTreeMap<String, ScopeCell>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScopeCell {
    recovery_charged: u64,
    load_charged: u64,
}

impl ScopeCell {
    fn charged(&self, rebalance_type: RebalanceType) -> u64 {
        match rebalance_type {
            RebalanceType::RecoveryBalance => self.recovery_charged,
            RebalanceType::LoadBalance => self.load_charged,
        }
    }

    fn charge(&mut self, rebalance_type: RebalanceType) {
        match rebalance_type {
            RebalanceType::RecoveryBalance => self.recovery_charged += 1,
            RebalanceType::LoadBalance => self.load_charged += 1,
        }
    }
}

impl ThrottleLedger {
    pub fn new(config: &ControlConfig) -> Self {
        ThrottleLedger {
            enabled: config.throttle_enabled,
            cluster_limits: config.cluster_limits.clone(),
            resource_limits: config.resource_limits.clone(),
            instance_limits: config.instance_limits.clone(),
            cluster: ScopeCell::default(),
            resources: BTreeMap::new(),
            instances: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn may(&self, cell: Option<&ScopeCell>, limits: &ScopeLimits, t: RebalanceType) -> bool {
        if !self.enabled {
            return true;
        }
        match limits.limit(t) {
            Some(limit) => cell.map_or(0, |c| c.charged(t)) < limit,
            None => true,
        }
    }

    pub fn may_charge_cluster(&self, rebalance_type: RebalanceType) -> bool {
        self.may(Some(&self.cluster), &self.cluster_limits, rebalance_type)
    }

    pub fn may_charge_resource(&self, rebalance_type: RebalanceType, resource: &str) -> bool {
        self.may(
            self.resources.get(resource),
            &self.resource_limits,
            rebalance_type,
        )
    }

    pub fn may_charge_instance(&self, rebalance_type: RebalanceType, instance: &str) -> bool {
        self.may(
            self.instances.get(instance),
            &self.instance_limits,
            rebalance_type,
        )
    }

    pub fn charge_cluster(&mut self, rebalance_type: RebalanceType) {
        if self.enabled {
            self.cluster.charge(rebalance_type);
        }
    }

    pub fn charge_resource(&mut self, rebalance_type: RebalanceType, resource: &str) {
        if self.enabled {
            self.resources
                .entry(resource.to_string())
                .or_default()
                .charge(rebalance_type);
        }
    }

    pub fn charge_instance(&mut self, rebalance_type: RebalanceType, instance: &str) {
        if self.enabled {
            self.instances
                .entry(instance.to_string())
                .or_default()
                .charge(rebalance_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_cluster_limits(recovery: u64, load: u64) -> ControlConfig {
        ControlConfig {
            cluster_limits: ScopeLimits {
                recovery_balance: Some(recovery),
                load_balance: Some(load),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_quota_exhaustion_at_cluster_scope() {
        let config = config_with_cluster_limits(2, 1);
        let mut ledger = ThrottleLedger::new(&config);

        assert!(ledger.may_charge_cluster(RebalanceType::RecoveryBalance));
        ledger.charge_cluster(RebalanceType::RecoveryBalance);
        assert!(ledger.may_charge_cluster(RebalanceType::RecoveryBalance));
        ledger.charge_cluster(RebalanceType::RecoveryBalance);
        assert!(!ledger.may_charge_cluster(RebalanceType::RecoveryBalance));

        // Categories are budgeted independently
        assert!(ledger.may_charge_cluster(RebalanceType::LoadBalance));
        ledger.charge_cluster(RebalanceType::LoadBalance);
        assert!(!ledger.may_charge_cluster(RebalanceType::LoadBalance));
    }

    #[test]
    fn test_scopes_are_independent() {
        let config = ControlConfig {
            instance_limits: ScopeLimits {
                recovery_balance: Some(1),
                load_balance: None,
            },
            ..Default::default()
        };
        let mut ledger = ThrottleLedger::new(&config);

        ledger.charge_instance(RebalanceType::RecoveryBalance, "host-1");
        assert!(!ledger.may_charge_instance(RebalanceType::RecoveryBalance, "host-1"));
        assert!(ledger.may_charge_instance(RebalanceType::RecoveryBalance, "host-2"));
        // Unlimited category on the same saturated instance
        assert!(ledger.may_charge_instance(RebalanceType::LoadBalance, "host-1"));
    }

    #[test]
    fn test_disabled_ledger_bypasses_everything() {
        let mut config = config_with_cluster_limits(1, 1);
        config.throttle_enabled = false;
        let mut ledger = ThrottleLedger::new(&config);

        for _ in 0..10 {
            assert!(ledger.may_charge_cluster(RebalanceType::RecoveryBalance));
            ledger.charge_cluster(RebalanceType::RecoveryBalance);
        }
    }

    #[test]
    fn test_unset_limit_never_throttles() {
        let mut ledger = ThrottleLedger::new(&ControlConfig::default());
        for _ in 0..100 {
            ledger.charge_resource(RebalanceType::LoadBalance, "orders");
        }
        assert!(ledger.may_charge_resource(RebalanceType::LoadBalance, "orders"));
    }
}
