//! Unified error type for the Parley client.

use parley_protocol::ProtocolError;
use parley_reliability::DeliveryError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Every variant is fatal to the session. Recoverable problems (a bad
/// command, an invalid field) never become a `ClientError`; they are
/// reported to the user as a [`Notice`](crate::Notice) instead.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A message was never confirmed by the server.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Session bookkeeping was asked to do something impossible.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server closed the connection without saying BYE.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The server's hostname did not resolve to any address.
    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
}
