use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThrottleError>;

#[derive(Debug, Error)]
pub enum ThrottleError {
    /// A required tick input was not supplied; the whole tick is aborted
    /// before any computation.
    #[error("Missing required tick input: {0}")]
    MissingInput(&'static str),

    /// A resource references a state model the snapshot does not know.
    /// Fatal to the resource only; the rest of the tick completes.
    #[error("State model definition {model} not found for resource {resource}")]
    UnknownStateModel { resource: String, model: String },

    /// The computed placement would overload an instance. The entire tick's
    /// result must be discarded and no transition dispatched from it.
    #[error(
        "Instance {instance} would hold more replicas than the maximum allowed ({limit}); \
         rebalance halted while processing resource {resource}"
    )]
    CapacityExceeded {
        instance: String,
        limit: u32,
        resource: String,
    },
}
