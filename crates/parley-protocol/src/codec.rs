//! The [`Codec`] trait shared by both wire formats.
//!
//! The client state machine doesn't care HOW a message becomes bytes; it
//! only needs something implementing [`Codec`]. The stream transport pairs
//! with [`TextCodec`](crate::TextCodec), the datagram transport with
//! [`BinaryCodec`](crate::BinaryCodec), and the rest of the client is
//! written once against this trait.

use crate::{DecodeError, Envelope, ProtocolError};

/// Converts [`Envelope`]s to bytes and back.
///
/// Implementations are pure: no I/O, no state. One call to `decode`
/// handles exactly one frame (one text line, or one datagram); framing is
/// the transport's job.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one wire frame.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the message can't be represented on
    /// this wire (missing id, unsupported type, delimiter inside a field).
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one wire frame.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] if the frame is malformed or unknown.
    fn decode(&self, data: &[u8]) -> Result<Envelope, DecodeError>;
}
