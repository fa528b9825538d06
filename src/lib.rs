//! Trigger Commands - route key presses and spoken phrases to actions
//!
//! A [`router::CommandRouter`] owns one key backend and one voice backend,
//! creating each on first use. Platform facilities (key events, speech
//! recognition, speech synthesis, element lookup) are injected through the
//! traits in [`input`], [`speech`] and [`elements`].

/// Action and error-sink callback types
pub mod action;
/// Configuration management
pub mod config;
/// Element commands (click, read aloud)
pub mod elements;
/// Error types
pub mod error;
/// In-process host capabilities
pub mod host;
/// Key input handling
pub mod input;
/// Trigger router
pub mod router;
/// Speech recognition and synthesis
pub mod speech;
/// Backend lifecycle state
pub mod state;
/// Logging setup
pub mod telemetry;

pub use action::{action, error_sink, Action, ActionResult, ErrorSink};
pub use error::{ActionError, CommandError};
pub use router::{CommandRouter, Host, RouterOptions};
pub use state::BackendState;
