//! Session state for the Parley client.
//!
//! A client talks to exactly one server over exactly one session. This
//! crate holds that session's bookkeeping:
//!
//! 1. **Lifecycle**: [`SessionState`] and its legal transitions
//! 2. **Identity**: validated credentials and display name ([`Identity`])
//! 3. **Delivery**: outbound id allocation and, on datagram transports,
//!    the [`ReliabilityEngine`](parley_reliability::ReliabilityEngine)
//!
//! # How it fits in the stack
//!
//! ```text
//! Client state machine (above)  ← drives transitions from network and console
//!     ↕
//! Session Layer (this crate)    ← state, identity, ids, pending sends
//!     ↕
//! Protocol + Reliability (below)
//! ```

mod error;
mod identity;
mod session;

pub use error::SessionError;
pub use identity::Identity;
pub use session::{EndReason, Session, SessionState};
