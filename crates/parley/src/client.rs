//! The protocol state machine.
//!
//! One [`Client`] owns the transport, the codec and the [`Session`]. It is
//! driven from outside: the event loop feeds it console lines, inbound
//! frames and timer ticks, and drains the [`Notice`]s it produces. Every
//! call runs to completion before the next one starts, so no state is
//! shared or locked.
//!
//! ```text
//!   console ──▶ handle_line ──┐                ┌──▶ Transport::send
//!                             ├──▶ Client ─────┤
//!   network ──▶ handle_frame ─┘      │         └──▶ notices ──▶ terminal
//!   timer   ──▶ tick ────────────────┘
//! ```

use parley_protocol::{validate, Codec, DecodeError, Envelope, MessageId, ProtocolMessage};
use parley_reliability::{AckPolicy, ReliabilityEngine, RetryConfig};
use parley_session::{EndReason, Identity, Session, SessionError, SessionState};
use parley_transport::{Transport, TransportError};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::console::{self, Command, Notice};
use crate::ClientError;

/// Content of the ERR sent when the server breaks the protocol.
const INVALID_MESSAGE: &str = "Invalid message from server";

/// A request that blocks console input until the server replies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Auth,
    Join(String),
}

#[derive(Debug, Clone)]
struct Awaiting {
    request: Request,
    id: MessageId,
}

impl Awaiting {
    /// Text replies carry no reference and match whatever is outstanding.
    fn matches(&self, ref_id: Option<MessageId>) -> bool {
        ref_id.is_none_or(|r| r == self.id)
    }
}

/// A chat client bound to one server.
pub struct Client<T: Transport, C: Codec> {
    transport: T,
    codec: C,
    session: Session,
    awaiting: Option<Awaiting>,
    notices: Vec<Notice>,
    /// The server already said BYE; ours would be unwelcome.
    peer_said_bye: bool,
    /// The transport failed or the peer hung up; nothing more can be sent.
    transport_dead: bool,
    closed: bool,
}

impl<T: Transport, C: Codec> Client<T, C> {
    /// Wraps a connected transport.
    ///
    /// A reliability engine is attached only when the transport does not
    /// acknowledge delivery itself.
    pub fn new(transport: T, codec: C, retry: RetryConfig, policy: AckPolicy) -> Self {
        let reliability =
            (!transport.supports_acknowledgment()).then(|| ReliabilityEngine::new(retry, policy));
        Self {
            transport,
            codec,
            session: Session::new(reliability),
            awaiting: None,
            notices: Vec::new(),
            peer_said_bye: false,
            transport_dead: false,
            closed: false,
        }
    }

    /// Moves from `Start` to `Auth` and greets the user.
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.session.transition(SessionState::Auth)?;
        self.notices.push(Notice::Info(console::GREETING.to_string()));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_ended()
    }

    /// Whether the console should be read. False while a request is
    /// outstanding and after the session ended.
    pub fn accepts_input(&self) -> bool {
        !self.session.is_ended() && self.awaiting.is_none()
    }

    /// Whether the retransmission timer should run.
    pub fn has_pending(&self) -> bool {
        self.session.has_pending()
    }

    /// Takes everything produced since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -----------------------------------------------------------------------
    // Console input
    // -----------------------------------------------------------------------

    /// Handles one console line. `None` means end of input.
    ///
    /// An empty line or end of input ends the session. Mistakes the user
    /// can fix are reported as notices and never fail the call.
    pub async fn handle_line(&mut self, line: Option<&str>) -> Result<(), ClientError> {
        if self.session.is_ended() {
            debug!("input ignored after session end");
            return Ok(());
        }
        if self.awaiting.is_some() {
            warn!("input ignored while a request is outstanding");
            return Ok(());
        }

        let line = line.map(|l| l.trim_end_matches(['\r', '\n'])).unwrap_or_default();
        if line.is_empty() {
            self.session.end(EndReason::UserQuit);
            return Ok(());
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.local_error(e.to_string());
                return Ok(());
            }
        };

        let result = self.dispatch_command(command).await;
        self.guard(result)
    }

    async fn dispatch_command(&mut self, command: Command) -> Result<(), ClientError> {
        let state = self.session.state();
        match (state, command) {
            (_, Command::Help) => {
                self.notices.push(Notice::Info(console::help_text(state).to_string()));
            }

            (
                SessionState::Auth,
                Command::Auth {
                    username,
                    secret,
                    display_name,
                },
            ) => {
                let identity = match Identity::new(username, secret, display_name) {
                    Ok(identity) => identity,
                    Err(e) => {
                        self.local_error(e.to_string());
                        return Ok(());
                    }
                };
                let message = ProtocolMessage::Auth {
                    username: identity.username().to_string(),
                    secret: identity.secret().to_string(),
                    display_name: identity.display_name().to_string(),
                };
                self.session.set_identity(identity);
                let id = self.send_message(message).await?;
                self.awaiting = Some(Awaiting {
                    request: Request::Auth,
                    id,
                });
            }
            (SessionState::Start | SessionState::Auth, _) => {
                self.local_error(console::EXPECTED_AUTH);
            }

            (SessionState::Open, Command::Auth { .. }) => {
                self.local_error(console::ALREADY_AUTHORIZED);
            }
            (SessionState::Open, Command::Join { channel_id }) => {
                if let Err(e) = validate::channel_id(&channel_id) {
                    self.local_error(e.to_string());
                    return Ok(());
                }
                let message = ProtocolMessage::Join {
                    channel_id: channel_id.clone(),
                    display_name: self.session.display_name()?.to_string(),
                };
                let id = self.send_message(message).await?;
                self.awaiting = Some(Awaiting {
                    request: Request::Join(channel_id),
                    id,
                });
            }
            (SessionState::Open, Command::Rename { display_name }) => {
                match self.session.rename(&display_name) {
                    Ok(()) => {}
                    Err(SessionError::Validation(e)) => self.local_error(e.to_string()),
                    Err(e) => return Err(e.into()),
                }
            }
            (SessionState::Open, Command::Chat(content)) => {
                if let Err(e) = validate::content(&content) {
                    self.local_error(e.to_string());
                    return Ok(());
                }
                let message = ProtocolMessage::Msg {
                    display_name: self.session.display_name()?.to_string(),
                    content,
                };
                self.send_message(message).await?;
            }

            (SessionState::End(_), _) => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Network input
    // -----------------------------------------------------------------------

    /// Waits for the next inbound frame. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.transport.recv().await
    }

    /// Receives one frame and handles it.
    pub async fn pump(&mut self) -> Result<(), ClientError> {
        let frame = self.recv().await;
        self.handle_frame(frame).await
    }

    /// Handles the outcome of one [`recv`](Self::recv).
    ///
    /// On the datagram transport every message with an id is confirmed,
    /// duplicates included, but acted on only the first time.
    pub async fn handle_frame(
        &mut self,
        frame: Result<Option<Vec<u8>>, TransportError>,
    ) -> Result<(), ClientError> {
        let bytes = match frame {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.transport_dead = true;
                if self.session.is_ended() {
                    return Ok(());
                }
                info!("server closed the connection");
                return self.guard(Err(ClientError::ConnectionClosed));
            }
            Err(e) => {
                self.transport_dead = true;
                return self.guard(Err(e.into()));
            }
        };

        let envelope = match self.codec.decode(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                let result = self.undecodable(e).await;
                return self.guard(result);
            }
        };
        debug!(kind = envelope.message.kind(), id = ?envelope.id, "received");

        let result = self.receive(envelope).await;
        self.guard(result)
    }

    async fn receive(&mut self, envelope: Envelope) -> Result<(), ClientError> {
        if let ProtocolMessage::Confirm { ref_id } = envelope.message {
            if let Some(engine) = self.session.reliability_mut() {
                engine.acknowledge(ref_id);
            }
            return Ok(());
        }

        if self.session.reliability().is_some() {
            if let Some(id) = envelope.id {
                self.send_confirm(id).await?;
                let duplicate = self
                    .session
                    .reliability_mut()
                    .is_some_and(|engine| engine.dedup(id));
                if duplicate {
                    return Ok(());
                }
            }
        }

        match self.session.state() {
            SessionState::Start | SessionState::Auth => self.receive_in_auth(envelope.message),
            SessionState::Open => self.receive_in_open(envelope.message).await,
            SessionState::End(_) => {
                debug!("message ignored after session end");
                Ok(())
            }
        }
    }

    fn receive_in_auth(&mut self, message: ProtocolMessage) -> Result<(), ClientError> {
        match message {
            ProtocolMessage::Reply {
                ok,
                ref_id,
                content,
            } if self
                .awaiting
                .as_ref()
                .is_some_and(|a| a.request == Request::Auth && a.matches(ref_id)) =>
            {
                self.settle(ref_id);
                self.awaiting = None;
                if ok {
                    self.notices.push(Notice::Success(content));
                    self.session.transition(SessionState::Open)?;
                    info!("authenticated");
                } else {
                    self.notices.push(Notice::Failure(content));
                    self.notices
                        .push(Notice::Info(console::help_text(SessionState::Auth).to_string()));
                }
            }
            ProtocolMessage::Err {
                display_name,
                content,
            } => self.remote_error(display_name, content),
            ProtocolMessage::Bye => self.peer_bye(),
            other => {
                warn!(kind = other.kind(), "unexpected message before authentication");
                self.session.end(EndReason::ProtocolViolation);
            }
        }
        Ok(())
    }

    async fn receive_in_open(&mut self, message: ProtocolMessage) -> Result<(), ClientError> {
        match message {
            ProtocolMessage::Msg {
                display_name,
                content,
            } => self.notices.push(Notice::Chat {
                from: display_name,
                content,
            }),
            ProtocolMessage::Err {
                display_name,
                content,
            } => self.remote_error(display_name, content),
            ProtocolMessage::Bye => self.peer_bye(),
            ProtocolMessage::Reply {
                ok,
                ref_id,
                content,
            } => {
                self.settle(ref_id);
                let joined = match self.awaiting.take() {
                    Some(Awaiting {
                        request: Request::Join(channel),
                        id,
                    }) if ref_id.is_none_or(|r| r == id) => Some(channel),
                    other => {
                        self.awaiting = other;
                        debug!(?ref_id, "reply matches no outstanding request");
                        None
                    }
                };
                if ok {
                    if let Some(channel) = joined {
                        self.session.set_channel(channel);
                    }
                    self.notices.push(Notice::Success(content));
                } else {
                    self.notices.push(Notice::Failure(content));
                }
            }
            other => {
                warn!(kind = other.kind(), "unexpected message in open state");
                self.protocol_violation().await?;
            }
        }
        Ok(())
    }

    /// A frame that could not be parsed.
    async fn undecodable(&mut self, error: DecodeError) -> Result<(), ClientError> {
        warn!(%error, "undecodable message");
        match self.session.state() {
            SessionState::Open => self.protocol_violation().await,
            SessionState::End(_) => Ok(()),
            _ => {
                self.session.end(EndReason::ProtocolViolation);
                Ok(())
            }
        }
    }

    /// Tells the server it misbehaved, then ends the session.
    async fn protocol_violation(&mut self) -> Result<(), ClientError> {
        self.local_error("invalid message from server");
        let message = ProtocolMessage::Err {
            display_name: self.session.display_name()?.to_string(),
            content: INVALID_MESSAGE.to_string(),
        };
        self.session.end(EndReason::ProtocolViolation);
        self.send_message(message).await?;
        Ok(())
    }

    fn remote_error(&mut self, from: String, content: String) {
        self.notices.push(Notice::RemoteError { from, content });
        self.session.end(EndReason::PeerError);
    }

    fn peer_bye(&mut self) {
        info!("server said goodbye");
        self.peer_said_bye = true;
        self.session.end(EndReason::PeerBye);
    }

    /// A REPLY also acknowledges the request it answers.
    fn settle(&mut self, ref_id: Option<MessageId>) {
        if let (Some(ref_id), Some(engine)) = (ref_id, self.session.reliability_mut()) {
            engine.acknowledge(ref_id);
        }
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// Resends whatever has waited a full interval for its CONFIRM.
    pub async fn tick(&mut self) -> Result<(), ClientError> {
        let result = self.retransmit_due().await;
        self.guard(result)
    }

    async fn retransmit_due(&mut self) -> Result<(), ClientError> {
        let Some(engine) = self.session.reliability_mut() else {
            return Ok(());
        };
        let due = engine.tick(Instant::now())?;
        for frame in due {
            self.transmit(&frame.bytes).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Ends the session politely: BYE, wait for its CONFIRM on datagram
    /// transports, close.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.session.end(EndReason::UserQuit);
        self.teardown(true).await
    }

    /// Ends the session without waiting: BYE if possible, then close.
    pub async fn abort(&mut self) -> Result<(), ClientError> {
        self.session.end(EndReason::Interrupted);
        self.teardown(false).await
    }

    async fn teardown(&mut self, wait: bool) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut result = Ok(());
        if !self.peer_said_bye && !self.transport_dead {
            result = match self.send_message(ProtocolMessage::Bye).await {
                Ok(id) if wait => self.await_confirmation(id).await,
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            };
        }

        info!(state = %self.session.state(), "closing transport");
        let closed = self.transport.close().await.map_err(ClientError::from);
        result.and(closed)
    }

    /// Keeps the link serviced until `id` is confirmed or given up on.
    async fn await_confirmation(&mut self, id: MessageId) -> Result<(), ClientError> {
        loop {
            let Some(engine) = self.session.reliability() else {
                return Ok(());
            };
            if !engine.is_pending(id) {
                return Ok(());
            }
            let Some(deadline) = engine.next_deadline() else {
                return Ok(());
            };

            tokio::select! {
                frame = self.transport.recv() => {
                    self.handle_frame(frame).await?;
                    if self.transport_dead {
                        return Ok(());
                    }
                }
                _ = time::sleep_until(deadline) => self.tick().await?,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Encodes, sends and (on datagram transports) tracks one message.
    async fn send_message(&mut self, message: ProtocolMessage) -> Result<MessageId, ClientError> {
        let id = self.session.next_message_id();
        let frame = self.codec.encode(&Envelope::new(id, message))?;
        self.transmit(&frame).await?;
        if let Some(engine) = self.session.reliability_mut() {
            engine.track(id, frame, Instant::now());
        }
        debug!(%id, "sent");
        Ok(id)
    }

    async fn send_confirm(&mut self, ref_id: MessageId) -> Result<(), ClientError> {
        let frame = self
            .codec
            .encode(&Envelope::bare(ProtocolMessage::Confirm { ref_id }))?;
        self.transmit(&frame).await
    }

    async fn transmit(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        if let Err(e) = self.transport.send(frame).await {
            self.transport_dead = true;
            return Err(e.into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn local_error(&mut self, message: impl Into<String>) {
        self.notices.push(Notice::LocalError(message.into()));
    }

    /// Ends the session on any fatal error before handing it back.
    fn guard(&mut self, result: Result<(), ClientError>) -> Result<(), ClientError> {
        if let Err(e) = &result {
            let reason = match e {
                ClientError::Delivery(_) => EndReason::DeliveryFailed,
                ClientError::Transport(_) | ClientError::ConnectionClosed => {
                    EndReason::ConnectionLost
                }
                _ => EndReason::ProtocolViolation,
            };
            self.session.end(reason);
        }
        result
    }
}
