//! Core protocol types for Parley's wire formats.
//!
//! Every type in this module travels "on the wire": the codecs in
//! [`crate::TextCodec`] and [`crate::BinaryCodec`] turn them into bytes and
//! back. Nothing here does I/O.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a message on the datagram wire.
///
/// A newtype over `u16` because the binary format reserves exactly two
/// big-endian bytes for it. Each side numbers its own messages; the peer
/// refers back to them through `ref_id` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u16);

impl MessageId {
    /// Returns the id as it appears on the wire.
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Builds an id from its two wire bytes.
    pub fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProtocolMessage
// ---------------------------------------------------------------------------

/// A single protocol message, independent of how it is framed.
///
/// Field contents are expected to satisfy the rules in [`crate::validate`];
/// the client validates before constructing outbound messages, while the
/// decoders accept whatever text the peer sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// Client → Server: log in with a username and secret.
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },

    /// Client → Server: move to another channel.
    Join {
        channel_id: String,
        display_name: String,
    },

    /// Either direction: a chat message.
    Msg {
        display_name: String,
        content: String,
    },

    /// Either direction: a fatal error notification.
    Err {
        display_name: String,
        content: String,
    },

    /// Either direction: the sender is closing the session.
    Bye,

    /// Server → Client: outcome of an `Auth` or `Join` request.
    ///
    /// `ref_id` names the request on the binary wire. The text wire has
    /// no ids, so text replies decode with `ref_id: None`.
    Reply {
        ok: bool,
        ref_id: Option<MessageId>,
        content: String,
    },

    /// Datagram acknowledgment of message `ref_id`. Never appears on the
    /// text wire.
    Confirm { ref_id: MessageId },
}

impl ProtocolMessage {
    /// Short uppercase name, matching the wire keyword.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH",
            Self::Join { .. } => "JOIN",
            Self::Msg { .. } => "MSG",
            Self::Err { .. } => "ERR",
            Self::Bye => "BYE",
            Self::Reply { .. } => "REPLY",
            Self::Confirm { .. } => "CONFIRM",
        }
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A message together with the id it travels under.
///
/// ```text
/// ┌─────────────────────────────┐
/// │ id: Some(#5)                │  ← binary wire only
/// │ ┌─────────────────────────┐ │
/// │ │ message: Msg { .. }     │ │
/// │ └─────────────────────────┘ │
/// └─────────────────────────────┘
/// ```
///
/// `Confirm` has no id of its own; everything else sent on the binary
/// wire must carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: Option<MessageId>,
    pub message: ProtocolMessage,
}

impl Envelope {
    /// An envelope with an id, as sent on the datagram transport.
    pub fn new(id: MessageId, message: ProtocolMessage) -> Self {
        Self {
            id: Some(id),
            message,
        }
    }

    /// An envelope without an id (text wire, or `Confirm`).
    pub fn bare(message: ProtocolMessage) -> Self {
        Self { id: None, message }
    }
}
