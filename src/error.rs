use thiserror::Error;

/// Errors surfaced to callers of the binding operations
#[derive(Debug, Error)]
pub enum CommandError {
    /// A regular binding targeted a key that holds a reserved binding
    #[error("regular key mappings cannot overwrite reserved key mapping for {key:?}")]
    ReservationConflict {
        /// Key the caller tried to bind
        key: String,
    },

    /// A required platform capability could not be found under any lookup name
    #[error("{capability} is not supported by the platform (tried: {})", .tried.join(", "))]
    CapabilityUnavailable {
        /// Human-readable capability name
        capability: &'static str,
        /// Every lookup name attempted, in order
        tried: Vec<String>,
    },

    /// An action failed while being dispatched
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Errors raised by actions themselves
///
/// The routing core never generates these; it only propagates them out of
/// the dispatch call that invoked the failing action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action provider could not find its target element
    #[error("Element with id \"{id}\" does not exist")]
    ElementNotFound {
        /// Element id that was looked up
        id: String,
    },

    /// Any other action failure
    #[error("action failed: {0}")]
    Failed(#[from] anyhow::Error),
}
