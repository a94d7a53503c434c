//! Wire protocol for Parley.
//!
//! This crate defines the "language" the chat client speaks:
//!
//! - **Types** ([`ProtocolMessage`], [`Envelope`], [`MessageId`]): the
//!   messages that travel on the wire.
//! - **Codecs** ([`Codec`] trait, [`TextCodec`], [`BinaryCodec`]): how
//!   those messages become bytes on the stream and datagram transports.
//! - **Validation** ([`validate`]): field rules checked before a message
//!   is built from user input.
//! - **Errors** ([`ProtocolError`], [`DecodeError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the client
//! state machine. It doesn't know about sockets or sessions.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Client (state machine)
//! ```

mod binary;
mod codec;
mod error;
mod text;
mod types;
pub mod validate;

pub use binary::{opcode, BinaryCodec, HEADER_LEN};
pub use codec::Codec;
pub use error::{DecodeError, ProtocolError};
pub use text::{TextCodec, CRLF};
pub use types::{Envelope, MessageId, ProtocolMessage};
pub use validate::ValidationError;
