use serde::{Deserialize, Serialize};

/// Why a partition needs to move replicas this tick.
///
/// Recovery repairs a durability deficiency (a structurally required replica
/// is missing); load balance optimizes an already fully-replicated
/// placement. The two are throttled under independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceType {
    RecoveryBalance,
    LoadBalance,
}

/// Per-resource counters reported to the monitoring sink after each pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceStats {
    /// Partitions classified as needing recovery balance.
    pub recovery_partitions: usize,
    /// Partitions classified as needing load balance.
    pub load_balance_partitions: usize,
    /// Recovery partitions with at least one replica denied quota.
    pub recovery_throttled: usize,
    /// Load-balance partitions with at least one replica denied quota.
    pub load_balance_throttled: usize,
}
