//! Error types for the session layer.

use crate::SessionState;

/// Errors raised by [`Session`](crate::Session) bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested state change is not an edge of the lifecycle graph.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// The session has ended; nothing more can happen on it.
    #[error("session has ended")]
    Ended,

    /// An operation needs an identity and none has been supplied yet.
    #[error("no identity has been set")]
    NoIdentity,

    /// A user-supplied field failed validation.
    #[error(transparent)]
    Validation(#[from] parley_protocol::ValidationError),
}
