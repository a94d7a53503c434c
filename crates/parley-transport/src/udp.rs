//! Datagram transport over `tokio::net::UdpSocket`.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::{Transport, TransportError};

/// Largest datagram we are prepared to receive.
pub const MAX_DATAGRAM: usize = 65_535;

/// An unconnected UDP socket talking to one server.
///
/// The server answers from a dynamically allocated port, so the
/// destination follows the source port of the server's datagrams.
/// Datagrams from any other host are dropped.
pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
    peer: SocketAddr,
    buf: Vec<u8>,
    closed: bool,
}

impl UdpTransport {
    /// Binds an ephemeral local port and targets `server`.
    pub async fn connect(server: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = match server {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(TransportError::ConnectFailed)?;
        tracing::info!(%server, "UDP transport ready");
        Ok(Self {
            socket,
            server,
            peer: server,
            buf: vec![0u8; MAX_DATAGRAM],
            closed: false,
        })
    }

    /// Address this socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Where the next datagram will be sent.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        self.socket
            .send_to(frame, self.peer)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let (n, from) = self
                .socket
                .recv_from(&mut self.buf)
                .await
                .map_err(TransportError::ReceiveFailed)?;

            if from.ip() != self.server.ip() {
                tracing::warn!(%from, "dropping datagram from unknown host");
                continue;
            }
            if from != self.peer {
                tracing::debug!(old = %self.peer, new = %from, "server port changed");
                self.peer = from;
            }
            return Ok(Some(self.buf[..n].to_vec()));
        }
    }

    fn supports_acknowledgment(&self) -> bool {
        false
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            tracing::debug!(server = %self.server, "closing UDP transport");
        }
        Ok(())
    }
}
