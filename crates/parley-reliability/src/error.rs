//! Error types for the reliability layer.

use parley_protocol::MessageId;

/// A tracked message could not be delivered.
///
/// Fatal to the session: the peer is unreachable or ignoring us.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Every retransmission went unacknowledged.
    #[error("message {id} was not confirmed after {retries} retransmissions")]
    Exhausted { id: MessageId, retries: u8 },
}
