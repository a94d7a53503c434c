//! Error types for the protocol layer.
//!
//! Encoding and decoding fail for different reasons, so they get separate
//! enums: a [`DecodeError`] means the peer sent something we can't parse,
//! a [`ProtocolError`] means we tried to put something on the wire that
//! the wire can't carry.

/// Why a received frame could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A text line that matches none of the known grammars.
    #[error("unrecognized message: {0:?}")]
    Unrecognized(String),

    /// The frame ended before a fixed field or a NUL terminator.
    #[error("truncated message")]
    Truncated,

    /// The first byte of a binary frame is not a known opcode.
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A REPLY result byte other than 0 (NOK) or 1 (OK).
    #[error("invalid reply result byte {0}")]
    InvalidResult(u8),

    /// A text field was not valid UTF-8.
    #[error("message field is not valid text")]
    InvalidText,
}

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message type has no representation on this wire
    /// (e.g. CONFIRM on the text wire).
    #[error("{0} cannot be encoded by this codec")]
    Unsupported(&'static str),

    /// The binary wire needs an id for this message but none was given.
    #[error("{0} requires a message id")]
    MissingId(&'static str),

    /// A field contains the wire's own delimiter and would corrupt framing.
    #[error("field {field} contains a forbidden delimiter")]
    Delimiter { field: &'static str },

    /// The text wire can't carry content that starts with whitespace
    /// or is empty.
    #[error("field {field} must not be empty or start with whitespace")]
    LeadingWhitespace { field: &'static str },
}

