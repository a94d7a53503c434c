//! Reliable delivery on top of an unreliable datagram transport.
//!
//! Every outbound message is tracked until the peer CONFIRMs it. Unconfirmed
//! messages are resent after [`RetryConfig::interval`] up to
//! [`RetryConfig::max_retries`] times, after which delivery has failed and
//! the session must end. Inbound ids are remembered so that a message
//! retransmitted by the peer is acted on only once.
//!
//! # Integration
//!
//! The engine performs no I/O and owns no timer. It sits inside the
//! client's `tokio::select!` loop next to a poll sleep:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         frame = transport.recv() => { /* acknowledge / dedup */ }
//!         _ = tokio::time::sleep(poll), if engine.has_pending() => {
//!             for r in engine.tick(Instant::now())? {
//!                 transport.send(&r.bytes).await?;
//!             }
//!         }
//!     }
//! }
//! ```

mod config;
mod engine;
mod error;

pub use config::{AckPolicy, RetryConfig};
pub use engine::{Acknowledgment, PendingSend, ReliabilityEngine, Retransmit};
pub use error::DeliveryError;
