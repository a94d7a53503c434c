//! The event loop: wires a [`Client`] to the terminal, the network, a
//! timer and Ctrl-C.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use parley_protocol::{BinaryCodec, Codec, TextCodec};
use parley_transport::{TcpTransport, Transport, UdpTransport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, TransportKind};
use crate::console::{Notice, Stream};
use crate::{Client, ClientError};

/// Connects according to `config` and runs the session to completion.
///
/// Returns `Ok` when the session ended normally (user quit, server BYE or
/// ERR, Ctrl-C) and `Err` on fatal failures.
pub async fn run(config: ClientConfig) -> Result<(), ClientError> {
    let addr = resolve(&config.host, config.port).await?;
    info!(%addr, transport = ?config.transport, "connecting");

    let console = BufReader::new(tokio::io::stdin());
    let interrupt = tokio::signal::ctrl_c();

    match config.transport {
        TransportKind::Tcp => {
            let transport = TcpTransport::connect(addr).await?;
            let client = Client::new(transport, TextCodec, config.retry, config.ack_policy);
            drive(client, console, interrupt, &config).await
        }
        TransportKind::Udp => {
            let transport = UdpTransport::connect(addr).await?;
            let client = Client::new(transport, BinaryCodec, config.retry, config.ack_policy);
            drive(client, console, interrupt, &config).await
        }
    }
}

/// Looks up `host`, preferring an IPv4 address when both families resolve.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ClientError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ClientError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ClientError::Resolve {
            host: host.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        })
}

/// Runs the select loop until the session finishes.
///
/// `interrupt` is polled across iterations, so an interrupt that lands
/// while an event is being handled is seen on the next turn.
async fn drive<T, C, I, S>(
    mut client: Client<T, C>,
    console: I,
    interrupt: S,
    config: &ClientConfig,
) -> Result<(), ClientError>
where
    T: Transport,
    C: Codec,
    I: AsyncBufRead + Unpin,
    S: Future<Output = io::Result<()>>,
{
    let mut lines = console.lines();
    tokio::pin!(interrupt);
    let mut listening = true;
    let mut poll = time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    client.start()?;
    emit(client.take_notices());

    let outcome = loop {
        if client.is_finished() {
            break Ok(());
        }

        let step = tokio::select! {
            frame = client.recv() => client.handle_frame(frame).await,
            line = lines.next_line(), if client.accepts_input() => {
                let line = line.unwrap_or_else(|e| {
                    warn!(error = %e, "console read failed, treating as end of input");
                    None
                });
                client.handle_line(line.as_deref()).await
            }
            _ = poll.tick(), if client.has_pending() => client.tick().await,
            signal = &mut interrupt, if listening => match signal {
                Ok(()) => {
                    info!("interrupted");
                    emit(client.take_notices());
                    return client.abort().await;
                }
                Err(e) => {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    listening = false;
                    Ok(())
                }
            },
        };
        emit(client.take_notices());

        if let Err(e) = step {
            break Err(e);
        }
    };

    match outcome {
        Ok(()) => {
            debug!(state = %client.state(), "session finished");
            let result = client.shutdown().await;
            emit(client.take_notices());
            result
        }
        Err(e) => {
            error!(error = %e, "session failed");
            if let Err(teardown) = client.abort().await {
                debug!(error = %teardown, "teardown after failure also failed");
            }
            emit(client.take_notices());
            Err(e)
        }
    }
}

fn emit(notices: Vec<Notice>) {
    for notice in notices {
        match notice.stream() {
            Stream::Stdout => println!("{notice}"),
            Stream::Stderr => eprintln!("{notice}"),
        }
    }
}
