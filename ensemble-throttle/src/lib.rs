//! # Ensemble Throttle
//!
//! Transition-throttling pass of the Ensemble control loop.
//!
//! Given the observed placement of replicas, a freshly computed target
//! placement, and the cluster's concurrency limits, this crate computes the
//! *intermediate* placement a single tick should converge toward: as close
//! to the target as possible without exceeding the allowed number of
//! simultaneous state transitions at cluster, resource, and instance scope.
//!
//! ## Pass structure
//!
//! 1. Resources are ordered by their configured priority so the most
//!    important resources claim shared quota first
//! 2. Every partition is classified: recovery balance (a required replica is
//!    missing), load balance (replicated but not at target), or neither
//! 3. In-flight transitions from prior ticks are charged against the fresh
//!    ledger and their targets pinned into the result
//! 4. Remaining quota is granted partition by partition, recovery before
//!    load; denied replicas stay at their current state and are reported so
//!    the dispatch layer can drop the corresponding transition
//! 5. The capacity guard validates the merged result and halts the cluster
//!    if an instance would be overloaded
//!
//! The pass is a pure, synchronous computation: no I/O, no shared state, and
//! deterministic output for identical inputs.

mod capacity;
mod classify;
mod errors;
mod ledger;
mod ordering;
mod stage;

// Re-export main types
pub use errors::{Result, ThrottleError};
pub use ledger::ThrottleLedger;
pub use ordering::compare_partition_urgency;
pub use stage::{
    compute_intermediate_placement, IntermediatePlacement, ThrottledReplica, TickInputs,
};
