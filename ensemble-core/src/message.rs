use serde::{Deserialize, Serialize};

/// An in-flight or to-be-issued replica state transition.
///
/// The throttling pass never mutates a message: it only decides whether to
/// honor it (write its target state into the intermediate placement) or
/// signal the dispatch layer to suppress it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier assigned by the dispatch layer.
    pub id: String,
    /// Replica state the transition starts from.
    pub from_state: String,
    /// Replica state the transition moves to.
    pub to_state: String,
    /// Instance the transition targets.
    pub target_instance: String,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        target_instance: impl Into<String>,
    ) -> Self {
        Message {
            id: id.into(),
            from_state: from_state.into(),
            to_state: to_state.into(),
            target_instance: target_instance.into(),
        }
    }
}
