//! # Parley
//!
//! A terminal chat client speaking the Parley protocol over either of two
//! transports:
//!
//! | Transport | Wire format | Delivery |
//! |---|---|---|
//! | TCP | CRLF-terminated text lines | the stream's own |
//! | UDP | binary, one message per datagram | CONFIRM + retransmit + dedup |
//!
//! The protocol state machine ([`Client`]) is written once, generic over
//! [`Transport`](parley_transport::Transport) and
//! [`Codec`](parley_protocol::Codec). [`run`] builds the right pair from a
//! [`ClientConfig`] and drives the session from the terminal.
//!
//! ```rust,no_run
//! use parley::{ClientConfig, TransportKind};
//!
//! # async fn example() -> Result<(), parley::ClientError> {
//! let config = ClientConfig {
//!     transport: TransportKind::Udp,
//!     host: "chat.example".into(),
//!     ..ClientConfig::default()
//! };
//! parley::run(config).await
//! # }
//! ```

mod client;
pub mod config;
pub mod console;
mod error;
mod runner;

pub use client::Client;
pub use config::{Cli, ClientConfig, TransportKind};
pub use console::{Command, CommandError, Notice};
pub use error::ClientError;
pub use runner::{resolve, run};
