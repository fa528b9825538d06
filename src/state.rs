/// Lifecycle state of a trigger backend
///
/// A disposed backend is consumed, so there is no variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// No attachment to the input source and no platform handles held
    Uninitialized,
    /// Attached to its input source
    Active,
}
