use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal state for a replica that is being removed from an instance.
/// Replicas in this state do not count against instance capacity.
pub const DROPPED_STATE: &str = "DROPPED";

/// State a replica reports after a failed transition.
pub const ERROR_STATE: &str = "ERROR";

/// State model used by task-framework resources. Task resources carry their
/// own throttling and are exempt from the capacity guard.
pub const TASK_MODEL_NAME: &str = "Task";

/// Required replica count rule for one state of a state model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCount {
    /// A fixed number of replicas must hold this state.
    Fixed(u32),
    /// Every candidate instance holds this state (e.g. ONLINE in an
    /// online/offline model).
    EveryCandidate,
    /// All replicas left over after higher-priority states are filled.
    /// At most one state per model uses this rule.
    Remaining,
}

/// Declares the valid states of a resource's replicas, their relative
/// priority, and how many replicas each state requires.
///
/// States are ordered by priority: index 0 is the top (fully active) state,
/// and a lower index means a higher priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateModelDefinition {
    name: String,
    states: Vec<(String, StateCount)>,
    initial_state: String,
}

impl StateModelDefinition {
    pub fn new(
        name: impl Into<String>,
        states: Vec<(String, StateCount)>,
        initial_state: impl Into<String>,
    ) -> Self {
        StateModelDefinition {
            name: name.into(),
            states,
            initial_state: initial_state.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully active state replicas aspire to, e.g. a leader/master state.
    pub fn top_state(&self) -> Option<&str> {
        self.states.first().map(|(state, _)| state.as_str())
    }

    /// The state a replica starts in before any transition is issued.
    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// Relative priority of a state; lower value means higher priority.
    /// Returns `None` for states the model does not declare.
    pub fn state_priority(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|(name, _)| name == state)
    }

    /// Required replica count per state, given the number of candidate
    /// instances available for the partition and the nominal replica count.
    ///
    /// States are filled in priority order and every count is capped by the
    /// candidates still available, so the totals never demand more replicas
    /// than the partition can place.
    pub fn state_count_map(
        &self,
        candidate_count: usize,
        replica_count: usize,
    ) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        let mut available = candidate_count;
        let mut remaining_replicas = replica_count;

        for (state, rule) in &self.states {
            let assigned = match rule {
                StateCount::Fixed(n) => (*n as usize).min(available),
                StateCount::EveryCandidate => available,
                StateCount::Remaining => continue,
            };
            if assigned > 0 {
                counts.insert(state.clone(), assigned);
                available -= assigned;
                remaining_replicas = remaining_replicas.saturating_sub(assigned);
            }
        }

        // Only the first remaining-rule state receives the leftover budget.
        for (state, rule) in &self.states {
            if matches!(rule, StateCount::Remaining) {
                let assigned = remaining_replicas.min(available);
                if assigned > 0 {
                    counts.insert(state.clone(), assigned);
                }
                break;
            }
        }

        counts
    }
}

/// Counts how many replicas currently hold each state.
pub fn state_counts(state_map: &BTreeMap<String, String>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for state in state_map.values() {
        *counts.entry(state.clone()).or_insert(0) += 1;
    }
    counts
}
