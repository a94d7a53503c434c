//! Transport abstraction layer for Parley.
//!
//! Provides the [`Transport`] trait that the client state machine is
//! generic over, and its implementations:
//!
//! - [`TcpTransport`]: reliable byte stream, framed into `\n`-terminated
//!   lines.
//! - [`UdpTransport`]: unreliable datagrams, one frame per datagram.
//! - [`MemoryTransport`]: in-process channel pair, for driving the
//!   client without sockets.
//!
//! # Feature Flags
//!
//! - `tcp` (default): the stream transport
//! - `udp` (default): the datagram transport

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "udp")]
mod udp;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemoryTransport};
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;
#[cfg(feature = "udp")]
pub use udp::{UdpTransport, MAX_DATAGRAM};

/// A duplex, frame-oriented channel to the chat server.
///
/// One frame is one protocol message: a text line on the stream
/// transport, a datagram on the datagram transport.
pub trait Transport: Send + 'static {
    /// Sends one frame to the server.
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the peer cleanly closed the connection.
    /// Must be cancel-safe: the client polls it inside `tokio::select!`,
    /// and a cancelled call must not lose a frame.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Whether the transport itself guarantees delivery.
    ///
    /// When this is `false` the client runs its own confirm/retransmit
    /// layer on top.
    fn supports_acknowledgment(&self) -> bool;

    /// Releases the underlying socket. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;
}
