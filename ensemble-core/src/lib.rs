//! # Ensemble Core
//!
//! Core data model shared by the Ensemble cluster orchestrator crates.
//!
//! ## Contents
//!
//! - **State models**: valid replica states, their relative priority, and the
//!   required replica counts per state
//! - **Placements**: observed, target, and intermediate replica-state maps
//! - **Cluster snapshot**: the read-only metadata view a control-loop tick
//!   computes against
//! - **Configuration**: throttle limits and rebalance control knobs
//! - **Collaborator traits**: monitoring sink and cluster maintenance handle
//!
//! Everything here is plain data plus narrow traits; the actual rebalance
//! throttling logic lives in `ensemble-throttle`.

pub mod config;
pub mod ideal_state;
pub mod message;
pub mod monitor;
pub mod placement;
pub mod rebalance;
pub mod snapshot;
pub mod state_model;

// Re-export main types
pub use config::{ControlConfig, ScopeLimits};
pub use ideal_state::{IdealState, RebalanceMode};
pub use message::Message;
pub use monitor::{MaintenanceHandle, RebalanceMonitor, RebalanceStatus};
pub use placement::{CurrentPlacement, PartitionStateMap, TargetPlacement};
pub use rebalance::{RebalanceStats, RebalanceType};
pub use snapshot::{ClusterSnapshot, Resource};
pub use state_model::{
    StateCount, StateModelDefinition, DROPPED_STATE, ERROR_STATE, TASK_MODEL_NAME,
};
