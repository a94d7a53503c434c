//! The client's single session: lifecycle state plus everything that
//! lives and dies with it.

use std::fmt;

use parley_protocol::MessageId;
use parley_reliability::ReliabilityEngine;
use tracing::{debug, info, warn};

use crate::{Identity, SessionError};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// ```text
///   Start ──▶ Auth ──(REPLY OK)──▶ Open
///               │                    │
///               └──────▶ End ◀───────┘
/// ```
///
/// `End` is reachable from every state and absorbs everything after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing exchanged yet.
    Start,
    /// Waiting for the user to authenticate, or for the server to answer.
    Auth,
    /// Authenticated; chatting in a channel.
    Open,
    /// Terminal.
    End(EndReason),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Auth => write!(f, "auth"),
            Self::Open => write!(f, "open"),
            Self::End(reason) => write!(f, "end ({reason})"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Empty line or end of console input.
    UserQuit,
    /// Ctrl-C.
    Interrupted,
    /// The server said BYE.
    PeerBye,
    /// The server sent ERR.
    PeerError,
    /// The server sent something not allowed in the current state.
    ProtocolViolation,
    /// The connection closed or failed.
    ConnectionLost,
    /// A message was never confirmed.
    DeliveryFailed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UserQuit => "user quit",
            Self::Interrupted => "interrupted",
            Self::PeerBye => "server said goodbye",
            Self::PeerError => "server reported an error",
            Self::ProtocolViolation => "protocol violation",
            Self::ConnectionLost => "connection lost",
            Self::DeliveryFailed => "delivery failed",
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything the client knows about its one conversation with the server.
///
/// Owned by the client and never shared. The reliability engine is present
/// only on transports that do not acknowledge delivery themselves.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    identity: Option<Identity>,
    channel: Option<String>,
    next_id: u16,
    reliability: Option<ReliabilityEngine>,
}

impl Session {
    pub fn new(reliability: Option<ReliabilityEngine>) -> Self {
        Self {
            state: SessionState::Start,
            identity: None,
            channel: None,
            next_id: 0,
            reliability,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SessionState::End(_))
    }

    /// Moves along one edge of the lifecycle graph.
    ///
    /// Staying in `Auth` or `Open` is allowed. Leaving `End` is not.
    pub fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        use SessionState::*;

        let allowed = match (self.state, to) {
            (End(_), _) => return Err(SessionError::Ended),
            (_, End(_)) => true,
            (Start, Auth) | (Auth, Auth) | (Auth, Open) | (Open, Open) => true,
            _ => false,
        };
        if !allowed {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        if self.state != to {
            info!(from = %self.state, to = %to, "session state changed");
        }
        self.state = to;
        Ok(())
    }

    /// Ends the session unless it already has. Returns `false` if it had,
    /// in which case the first reason is kept.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.is_ended() {
            return false;
        }
        info!(from = %self.state, %reason, "session ended");
        self.state = SessionState::End(reason);
        true
    }

    // -- identity ---------------------------------------------------------

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        debug!(username = identity.username(), "identity set");
        self.identity = Some(identity);
    }

    /// The name to put on outgoing messages.
    pub fn display_name(&self) -> Result<&str, SessionError> {
        self.identity
            .as_ref()
            .map(Identity::display_name)
            .ok_or(SessionError::NoIdentity)
    }

    pub fn rename(&mut self, display_name: &str) -> Result<(), SessionError> {
        let identity = self.identity.as_mut().ok_or(SessionError::NoIdentity)?;
        identity.rename(display_name)?;
        debug!(display_name, "renamed");
        Ok(())
    }

    // -- channel ----------------------------------------------------------

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn set_channel(&mut self, channel: impl Into<String>) {
        let channel = channel.into();
        info!(%channel, "joined channel");
        self.channel = Some(channel);
    }

    // -- ids and reliability ----------------------------------------------

    /// Hands out the next outbound id: 0, 1, 2, … wrapping after 65535.
    pub fn next_message_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            warn!("message id counter wrapped");
        }
        id
    }

    pub fn reliability(&self) -> Option<&ReliabilityEngine> {
        self.reliability.as_ref()
    }

    pub fn reliability_mut(&mut self) -> Option<&mut ReliabilityEngine> {
        self.reliability.as_mut()
    }

    /// Whether the retransmission timer is needed.
    pub fn has_pending(&self) -> bool {
        self.reliability
            .as_ref()
            .is_some_and(ReliabilityEngine::has_pending)
    }
}
