// ABOUTME: Crate-wide error taxonomy for the bot core.
// ABOUTME: Distinguishes connection, queue, state, and plugin failure classes.

use std::time::Duration;

use thiserror::Error;

use crate::event_loop::LoopState;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the core.
///
/// Callers can match on variants to tell a fatal startup failure
/// (`Connection`) apart from an isolated per-action failure
/// (`ActionFailed`) or a state conflict (`DuplicateEndpoint`,
/// `DuplicatePlugin`).
#[derive(Debug, Error)]
pub enum Error {
    /// The backend capability was unreachable. Fatal to startup.
    #[error("backend connection failed: {0}")]
    Connection(String),

    /// A connect/read/action watchdog expired.
    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    /// A driver method was called before `connect()` succeeded.
    #[error("driver is not connected; call connect() first")]
    NotConnected,

    /// One queued action failed during execution. Isolated to its submitter;
    /// the worker keeps processing subsequent actions.
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// The action queue is draining and no longer accepts submissions.
    #[error("action queue is closed")]
    QueueClosed,

    /// A bounded action queue rejected a submission.
    #[error("action queue is full (capacity {0})")]
    QueueFull(usize),

    /// No endpoint with this name is registered in the state store.
    #[error("no endpoint named '{0}'")]
    UnknownEndpoint(String),

    /// An endpoint name collided during bulk setup.
    #[error("endpoint name '{0}' is already registered")]
    DuplicateEndpoint(String),

    /// A plugin name collided during registration.
    #[error("plugin name '{0}' is already registered")]
    DuplicatePlugin(String),

    /// No plugin with this name is registered.
    #[error("no plugin named '{0}'")]
    UnknownPlugin(String),

    /// The event loop reached its terminal state; the request cannot apply.
    #[error("event loop is stopped")]
    Stopped,

    /// `run()` was invoked on a loop that already left the `Created` state.
    #[error("cannot start event loop from state {0:?}")]
    AlreadyStarted(LoopState),

    /// An argument or configuration value was rejected.
    #[error("{0}")]
    Invalid(String),
}
