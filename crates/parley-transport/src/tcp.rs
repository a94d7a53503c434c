//! Stream transport over `tokio::net::TcpStream`.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Split};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::{Transport, TransportError};

/// A connected TCP stream split into `\n`-terminated frames.
///
/// Framing on the line terminator means one read may yield several
/// messages, or a message may arrive across several reads, without
/// confusing the decoder. The `\n` is stripped; a preceding `\r` is left
/// for the codec.
pub struct TcpTransport {
    peer: SocketAddr,
    lines: Split<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    closed: bool,
}

impl TcpTransport {
    /// Connects to the server at `addr`.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        stream
            .set_nodelay(true)
            .map_err(TransportError::ConnectFailed)?;
        let (read, writer) = stream.into_split();
        tracing::info!(%peer, "TCP transport connected");
        Ok(Self {
            peer,
            lines: BufReader::new(read).split(b'\n'),
            writer,
            closed: false,
        })
    }

    /// The server's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        self.writer
            .write_all(frame)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let line = self
                .lines
                .next_segment()
                .await
                .map_err(TransportError::ReceiveFailed)?;
            match line {
                Some(line) if line.iter().all(u8::is_ascii_whitespace) => {
                    tracing::trace!(peer = %self.peer, "skipping blank line");
                    continue;
                }
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }

    fn supports_acknowledgment(&self) -> bool {
        true
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!(peer = %self.peer, "closing TCP transport");
        self.writer
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
