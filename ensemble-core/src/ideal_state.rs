use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the orchestrator is allowed to move a resource's replicas.
/// Transition throttling applies only to `FullAuto` resources; all other
/// modes pass the target placement through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceMode {
    /// The orchestrator controls both placement and states.
    FullAuto,
    /// Placement is fixed externally; the orchestrator controls states.
    SemiAuto,
    /// Placement and states are both fixed externally.
    Customized,
}

impl Default for RebalanceMode {
    fn default() -> Self {
        Self::SemiAuto
    }
}

/// Per-resource declaration of how it should be rebalanced: rebalance mode,
/// nominal replica count, and the minimum-active-replica override used when
/// classifying recovery needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdealState {
    pub resource_name: String,
    /// Name of the state model definition governing this resource.
    pub state_model_ref: String,
    #[serde(default)]
    pub rebalance_mode: RebalanceMode,
    /// Nominal replica count; `None` means one replica per preference-list
    /// entry.
    #[serde(default)]
    pub replicas: Option<u32>,
    /// Overrides the replica requirement used for recovery classification.
    #[serde(default)]
    pub min_active_replicas: Option<u32>,
    /// Free-form simple fields, e.g. the resource priority value.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl IdealState {
    pub fn new(resource_name: impl Into<String>, state_model_ref: impl Into<String>) -> Self {
        IdealState {
            resource_name: resource_name.into(),
            state_model_ref: state_model_ref.into(),
            rebalance_mode: RebalanceMode::default(),
            replicas: None,
            min_active_replicas: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_rebalance_mode(mut self, mode: RebalanceMode) -> Self {
        self.rebalance_mode = mode;
        self
    }

    /// Nominal replica count, falling back to the preference-list size when
    /// no explicit count is declared.
    pub fn replica_count(&self, preference_list_len: usize) -> usize {
        self.replicas
            .map(|r| r as usize)
            .unwrap_or(preference_list_len)
    }

    /// Replica requirement for recovery classification: the explicit
    /// minimum-active override when set, else the nominal replica count.
    pub fn required_replica_count(&self, preference_list_len: usize) -> usize {
        self.min_active_replicas
            .map(|r| r as usize)
            .unwrap_or_else(|| self.replica_count(preference_list_len))
    }

    pub fn property(&self, field: &str) -> Option<&str> {
        self.properties.get(field).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replica_count_fallbacks() {
        let mut ideal = IdealState::new("orders", "MasterSlave");
        assert_eq!(ideal.replica_count(3), 3);
        assert_eq!(ideal.required_replica_count(3), 3);

        ideal.replicas = Some(2);
        assert_eq!(ideal.replica_count(3), 2);
        assert_eq!(ideal.required_replica_count(3), 2);

        ideal.min_active_replicas = Some(1);
        assert_eq!(ideal.required_replica_count(3), 1);
    }

    #[test]
    fn test_default_mode_is_not_full_auto() {
        let ideal = IdealState::new("orders", "MasterSlave");
        assert_eq!(ideal.rebalance_mode, RebalanceMode::SemiAuto);
    }

    #[test]
    fn test_deserialize_defaults() {
        let ideal: IdealState = serde_json::from_str(
            r#"{"resource_name": "orders", "state_model_ref": "MasterSlave"}"#,
        )
        .unwrap();
        assert_eq!(ideal.rebalance_mode, RebalanceMode::SemiAuto);
        assert_eq!(ideal.replicas, None);
        assert!(ideal.properties.is_empty());
    }
}
