//! Command-line interface and client configuration.

use std::time::Duration;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use parley_reliability::{AckPolicy, RetryConfig};
use serde::{Deserialize, Serialize};

/// Port used when `-p` is not given.
pub const DEFAULT_PORT: u16 = 4567;

/// How often the event loop checks for due retransmissions.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Which transport (and therefore which wire format) to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Text protocol over a TCP stream.
    Tcp,
    /// Binary protocol over UDP datagrams with confirmations.
    Udp,
}

/// Chat client for the Parley protocol.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Transport protocol.
    #[arg(short = 't', value_enum)]
    pub transport: TransportKind,

    /// Server IP address or hostname.
    #[arg(short = 's')]
    pub server: String,

    /// Server port.
    #[arg(short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// UDP confirmation timeout in milliseconds.
    #[arg(short = 'd')]
    pub timeout_ms: Option<u16>,

    /// Maximum number of UDP retransmissions.
    #[arg(short = 'r')]
    pub retries: Option<u8>,
}

impl Cli {
    /// Resolves defaults and checks flags that only make sense for UDP.
    ///
    /// # Errors
    /// A usage error if `-d` or `-r` is combined with `-t tcp`. The caller
    /// typically calls [`clap::Error::exit`] on it.
    pub fn into_config(self) -> Result<ClientConfig, clap::Error> {
        if self.transport == TransportKind::Tcp {
            if let Some(flag) = [("-d", self.timeout_ms.is_some()), ("-r", self.retries.is_some())]
                .into_iter()
                .find_map(|(flag, given)| given.then_some(flag))
            {
                return Err(Self::command().error(
                    ErrorKind::ArgumentConflict,
                    format!("{flag} only applies to the udp transport"),
                ));
            }
        }

        let retry = RetryConfig::from_millis(
            self.timeout_ms.unwrap_or(RetryConfig::DEFAULT_INTERVAL_MS),
            self.retries.unwrap_or(RetryConfig::DEFAULT_RETRIES),
        );

        Ok(ClientConfig {
            transport: self.transport,
            host: self.server,
            port: self.port,
            retry,
            ..ClientConfig::default()
        })
    }
}

/// Everything the runner needs to start a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    /// Ignored on TCP.
    pub retry: RetryConfig,
    /// Wake-up period for retransmission checks while messages are pending.
    pub poll_interval: Duration,
    pub ack_policy: AckPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            retry: RetryConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            ack_policy: AckPolicy::default(),
        }
    }
}
