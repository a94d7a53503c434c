//! State machine tests over the binary wire with confirmations.
//!
//! The in-memory transport reports datagram semantics, so the client
//! attaches a reliability engine. Timing tests run on tokio's paused clock.

use std::time::Duration;

use parley::{Client, ClientError, Notice};
use parley_protocol::{BinaryCodec, Codec, Envelope, MessageId, ProtocolMessage};
use parley_reliability::{AckPolicy, DeliveryError, RetryConfig};
use parley_session::{EndReason, SessionState};
use parley_transport::{MemoryPeer, MemoryTransport, Transport, UdpTransport};
use tokio::time;

// =========================================================================
// Helpers
// =========================================================================

type DatagramClient = Client<MemoryTransport, BinaryCodec>;

const RETRY: RetryConfig = RetryConfig {
    interval: Duration::from_millis(250),
    max_retries: 3,
};

fn started_with(policy: AckPolicy) -> (DatagramClient, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair(false);
    let mut client = Client::new(transport, BinaryCodec, RETRY, policy);
    client.start().expect("start should succeed");
    client.take_notices();
    (client, peer)
}

fn started() -> (DatagramClient, MemoryPeer) {
    started_with(AckPolicy::RemoveOnFirst)
}

fn frame(id: u16, message: ProtocolMessage) -> Vec<u8> {
    BinaryCodec
        .encode(&Envelope::new(MessageId(id), message))
        .expect("server frame should encode")
}

fn confirm(ref_id: u16) -> Vec<u8> {
    vec![0x00, (ref_id >> 8) as u8, ref_id as u8]
}

fn reply(id: u16, ok: bool, ref_id: u16, content: &str) -> Vec<u8> {
    frame(
        id,
        ProtocolMessage::Reply {
            ok,
            ref_id: Some(MessageId(ref_id)),
            content: content.into(),
        },
    )
}

fn msg(id: u16, from: &str, content: &str) -> Vec<u8> {
    frame(
        id,
        ProtocolMessage::Msg {
            display_name: from.into(),
            content: content.into(),
        },
    )
}

fn decode_all(peer: &mut MemoryPeer) -> Vec<Envelope> {
    peer.drain()
        .iter()
        .map(|f| BinaryCodec.decode(f).expect("client frame should decode"))
        .collect()
}

/// A client authenticated as alice / Alice, with its AUTH (id 0) settled.
async fn authenticated_with(policy: AckPolicy) -> (DatagramClient, MemoryPeer) {
    let (mut client, mut peer) = started_with(policy);
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();
    peer.send(confirm(0));
    client.pump().await.unwrap();
    peer.send(reply(100, true, 0, "Auth success."));
    client.pump().await.unwrap();
    assert_eq!(client.state(), SessionState::Open);
    assert!(!client.has_pending());
    peer.drain();
    client.take_notices();
    (client, peer)
}

async fn authenticated() -> (DatagramClient, MemoryPeer) {
    authenticated_with(AckPolicy::RemoveOnFirst).await
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_auth_frame_layout() {
    let (mut client, mut peer) = started();
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();

    let mut expected = vec![0x02, 0x00, 0x00];
    expected.extend_from_slice(b"alice\0Alice\0s3cr3t\0");
    assert_eq!(peer.drain(), vec![expected]);
    assert!(client.has_pending());
}

#[tokio::test]
async fn test_reply_is_confirmed_and_opens_session() {
    let (mut client, mut peer) = started();
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();
    peer.drain();

    peer.send(confirm(0));
    client.pump().await.unwrap();
    assert!(!client.has_pending());
    assert!(peer.try_recv().is_none(), "a CONFIRM is never confirmed");

    peer.send(reply(100, true, 0, "hi"));
    client.pump().await.unwrap();
    assert_eq!(peer.drain(), vec![confirm(100)]);
    assert_eq!(client.state(), SessionState::Open);
    assert_eq!(client.take_notices(), vec![Notice::Success("hi".into())]);
}

#[tokio::test]
async fn test_reply_without_confirm_still_settles_request() {
    let (mut client, mut peer) = started();
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();
    peer.send(reply(100, false, 0, "bad secret"));
    client.pump().await.unwrap();

    assert!(!client.has_pending());
    assert_eq!(client.state(), SessionState::Auth);
    assert_eq!(
        client.take_notices().first(),
        Some(&Notice::Failure("bad secret".into()))
    );
}

#[tokio::test]
async fn test_reply_for_other_request_in_auth_ends_session() {
    let (mut client, mut peer) = started();
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();
    peer.send(reply(100, true, 42, "not yours"));
    client.pump().await.unwrap();
    assert_eq!(
        client.state(),
        SessionState::End(EndReason::ProtocolViolation)
    );
}

#[tokio::test]
async fn test_settle_on_second_accepts_confirm_then_reply() {
    let (mut client, mut peer) = started_with(AckPolicy::SettleOnSecond);
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();

    peer.send(confirm(0));
    client.pump().await.unwrap();
    assert!(!client.has_pending(), "marked entries are not resent");
    assert_eq!(client.session().reliability().unwrap().pending_len(), 1);

    peer.send(reply(100, true, 0, "ok"));
    client.pump().await.unwrap();
    assert_eq!(client.session().reliability().unwrap().pending_len(), 0);
    assert_eq!(client.state(), SessionState::Open);
}

// =========================================================================
// Retransmission
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_msg_resent_three_times_then_fails() {
    let (mut client, mut peer) = authenticated().await;

    // Ids 1..=4 are confirmed; id 5 never is.
    for id in 1..=4u16 {
        client.handle_line(Some("filler")).await.unwrap();
        peer.send(confirm(id));
        client.pump().await.unwrap();
    }
    peer.drain();
    client.handle_line(Some("anyone?")).await.unwrap();
    let original = peer.drain();
    assert_eq!(original.len(), 1);
    assert_eq!(&original[0][..3], &[0x04, 0x00, 0x05]);

    for _ in 0..3 {
        time::advance(RETRY.interval).await;
        client.tick().await.unwrap();
        assert_eq!(peer.drain(), original, "resend must be byte-identical");
    }

    time::advance(RETRY.interval).await;
    let err = client.tick().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Delivery(DeliveryError::Exhausted {
            id: MessageId(5),
            retries: 3
        })
    ));
    assert!(peer.try_recv().is_none(), "no fourth resend");
    assert_eq!(
        client.state(),
        SessionState::End(EndReason::DeliveryFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_nothing_resent_before_interval() {
    let (mut client, mut peer) = authenticated().await;
    client.handle_line(Some("hello")).await.unwrap();
    peer.drain();

    time::advance(RETRY.interval - Duration::from_millis(1)).await;
    client.tick().await.unwrap();
    assert!(peer.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_input_stays_suspended_until_join_reply() {
    let (mut client, mut peer) = authenticated().await;
    client.handle_line(Some("/join general")).await.unwrap();
    let join_id = decode_all(&mut peer)[0].id.unwrap();

    peer.send(confirm(join_id.0));
    client.pump().await.unwrap();
    assert!(!client.accepts_input(), "CONFIRM is not the REPLY");

    peer.send(reply(101, true, join_id.0, "welcome"));
    client.pump().await.unwrap();
    assert!(client.accepts_input());
    assert_eq!(client.session().channel(), Some("general"));
}

// =========================================================================
// Duplicate suppression
// =========================================================================

#[tokio::test]
async fn test_duplicate_msg_shown_once_confirmed_twice() {
    let (mut client, mut peer) = authenticated().await;

    peer.send(msg(7, "Carol", "hi"));
    peer.send(msg(7, "Carol", "hi"));
    client.pump().await.unwrap();
    client.pump().await.unwrap();

    let chats: Vec<String> = client
        .take_notices()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(chats, vec!["Carol: hi"]);
    assert_eq!(peer.drain(), vec![confirm(7), confirm(7)]);
}

#[tokio::test]
async fn test_duplicate_err_handled_once() {
    let (mut client, mut peer) = authenticated().await;
    let err = frame(
        9,
        ProtocolMessage::Err {
            display_name: "Server".into(),
            content: "bye".into(),
        },
    );
    peer.send(err.clone());
    peer.send(err);
    client.pump().await.unwrap();
    client.pump().await.unwrap();

    assert_eq!(client.take_notices().len(), 1);
    assert_eq!(client.state(), SessionState::End(EndReason::PeerError));
}

#[tokio::test]
async fn test_confirm_sent_even_after_end() {
    let (mut client, mut peer) = authenticated().await;
    client.handle_line(None).await.unwrap();
    peer.send(msg(12, "Carol", "late"));
    client.pump().await.unwrap();

    assert_eq!(peer.drain(), vec![confirm(12)]);
    assert!(client.take_notices().is_empty());
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_bye_confirm() {
    let (mut client, mut peer) = authenticated().await;
    client.handle_line(None).await.unwrap();

    // BYE will be id 1; its CONFIRM is already queued.
    peer.send(confirm(1));
    client.shutdown().await.unwrap();

    let sent = decode_all(&mut peer);
    assert_eq!(sent, vec![Envelope::new(MessageId(1), ProtocolMessage::Bye)]);
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_gives_up_after_retries() {
    let (mut client, mut peer) = authenticated().await;
    client.handle_line(None).await.unwrap();

    let err = client.shutdown().await.unwrap_err();
    assert!(matches!(err, ClientError::Delivery(_)));

    let byes = decode_all(&mut peer);
    assert_eq!(byes.len(), 4, "BYE plus three resends");
    assert!(byes.iter().all(|e| e.message == ProtocolMessage::Bye));
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test]
async fn test_abort_does_not_wait() {
    let (mut client, mut peer) = authenticated().await;
    client.abort().await.unwrap();

    assert_eq!(decode_all(&mut peer).len(), 1);
    assert!(client.has_pending(), "BYE left unconfirmed");
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test]
async fn test_bye_from_server_is_confirmed_not_answered() {
    let (mut client, mut peer) = authenticated().await;
    peer.send(frame(50, ProtocolMessage::Bye));
    client.pump().await.unwrap();
    client.shutdown().await.unwrap();

    assert_eq!(peer.drain(), vec![confirm(50)]);
    assert_eq!(client.state(), SessionState::End(EndReason::PeerBye));
}

// =========================================================================
// Over a real socket
// =========================================================================

#[tokio::test]
async fn test_session_over_loopback_udp() {
    let welcome = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dynamic = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let transport = UdpTransport::connect(welcome.local_addr().unwrap())
        .await
        .unwrap();
    assert!(!transport.supports_acknowledgment());

    let mut client = Client::new(transport, BinaryCodec, RETRY, AckPolicy::RemoveOnFirst);
    client.start().unwrap();
    client.handle_line(Some("/auth alice s3cr3t Alice")).await.unwrap();

    let mut buf = [0u8; 1024];
    let (n, client_addr) = welcome.recv_from(&mut buf).await.unwrap();
    assert_eq!(buf[0], 0x02);
    assert_eq!(n, 3 + b"alice\0Alice\0s3cr3t\0".len());

    // The session continues on the server's dynamic port.
    dynamic.send_to(&confirm(0), client_addr).await.unwrap();
    dynamic
        .send_to(&reply(300, true, 0, "welcome"), client_addr)
        .await
        .unwrap();
    client.pump().await.unwrap();
    client.pump().await.unwrap();
    assert_eq!(client.state(), SessionState::Open);

    let (n, _) = dynamic.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &confirm(300)[..]);

    client.abort().await.unwrap();
    let (n, _) = dynamic.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &[0xFF, 0x00, 0x01]);
}
