//! In-process transport backed by tokio channels.
//!
//! The client half ([`MemoryTransport`]) behaves like a real transport;
//! the other half ([`MemoryPeer`]) plays the server. Dropping the peer's
//! sender looks like the server closing the connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{Transport, TransportError};

/// Client side of an in-memory link.
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reliable: bool,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

/// Server side of an in-memory link.
pub struct MemoryPeer {
    to_client: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Creates a linked pair. `reliable` selects stream semantics (`true`)
    /// or datagram semantics (`false`) for
    /// [`Transport::supports_acknowledgment`].
    pub fn pair(reliable: bool) -> (Self, MemoryPeer) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            inbound,
            outbound,
            reliable,
            closes: Arc::clone(&closes),
            closed: false,
        };
        let peer = MemoryPeer {
            to_client: Some(to_client),
            from_client,
            closes,
        };
        (transport, peer)
    }
}

impl Transport for MemoryTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    fn supports_acknowledgment(&self) -> bool {
        self.reliable
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl MemoryPeer {
    /// Queues a frame for the client. Ignored once the link is hung up.
    pub fn send(&self, frame: impl Into<Vec<u8>>) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(frame.into());
        }
    }

    /// Takes the next frame the client sent, if one is queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.try_recv().ok()
    }

    /// Drains every frame the client has sent so far.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Waits for the next frame the client sends.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.recv().await
    }

    /// Closes the server → client direction; the client's next `recv`
    /// returns `Ok(None)`.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// How many times the client closed its transport.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}
