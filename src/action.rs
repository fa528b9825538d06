use std::rc::Rc;

use crate::error::ActionError;

/// Outcome of running an [`Action`]
pub type ActionResult = Result<(), ActionError>;

/// Zero-argument callback bound to a trigger
///
/// Backends hold shared handles; the caller keeps ownership of whatever the
/// closure captures.
pub type Action = Rc<dyn Fn() -> ActionResult>;

/// Notification for recognition events that could not be routed to an action
pub type ErrorSink = Rc<dyn Fn()>;

/// Wraps a closure as an [`Action`]
pub fn action<F>(f: F) -> Action
where
    F: Fn() -> ActionResult + 'static,
{
    Rc::new(f)
}

/// Wraps a closure as an [`ErrorSink`]
pub fn error_sink<F>(f: F) -> ErrorSink
where
    F: Fn() + 'static,
{
    Rc::new(f)
}
