//! Handshake tests over in-memory streams.

use auth::{AuthDecision, CredentialSource, CredentialStore, Tier};
use std::{sync::Arc, time::Duration};
use vncgate_protocol::{
    ClientMessage, HandshakeError, ServerMessage,
    codec::{FrameError, read_message, write_message},
    connect, serve,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn gate() -> auth::CredentialGate {
    let source = CredentialSource::inline("alpha\n__BEGIN_VIEWONLY__\nbeta\n");
    Arc::new(CredentialStore::load(source).unwrap()).install()
}

async fn attempt(password: &'static [u8]) -> (AuthDecision, AuthDecision) {
    let (mut server, mut client) = tokio::io::duplex(4096);
    let gate = gate();
    let server = tokio::spawn(async move { serve(&mut server, &gate, TIMEOUT).await.unwrap() });
    let seen = connect(&mut client, password).await.unwrap();
    (server.await.unwrap(), seen)
}

#[tokio::test]
async fn full_password_admits_with_control() {
    let (server, client) = attempt(b"alpha").await;
    assert_eq!(server, AuthDecision::accept(Tier::Full));
    assert_eq!(client, server);
}

#[tokio::test]
async fn view_only_password_admits_display_only() {
    let (server, client) = attempt(b"beta").await;
    assert_eq!(server, AuthDecision::accept(Tier::ViewOnly));
    assert_eq!(client, server);
}

#[tokio::test]
async fn wrong_password_is_denied() {
    let (server, client) = attempt(b"gamma").await;
    assert_eq!(server, AuthDecision::reject());
    assert_eq!(client, AuthDecision::reject());
}

#[tokio::test]
async fn silent_peer_times_out() {
    let (mut server, _client) = tokio::io::duplex(4096);
    let gate = gate();
    let err = serve(&mut server, &gate, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Timeout));
}

#[tokio::test]
async fn ping_before_response_is_unexpected() {
    let (mut server, mut client) = tokio::io::duplex(4096);
    let gate = gate();
    let task = tokio::spawn(async move { serve(&mut server, &gate, TIMEOUT).await });

    let _: ServerMessage = read_message(&mut client).await.unwrap();
    write_message(&mut client, &ClientMessage::Ping).await.unwrap();
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, HandshakeError::Unexpected(_)));
}

#[tokio::test]
async fn oversized_frame_is_refused() {
    let len: u32 = 1024 * 1024;
    let mut buf = len.to_be_bytes().to_vec();
    buf.extend_from_slice(b"{}");
    let mut cursor = std::io::Cursor::new(buf);
    let result: Result<ClientMessage, _> = read_message(&mut cursor).await;
    assert!(matches!(result, Err(FrameError::TooLarge { .. })));
}

#[tokio::test]
async fn eof_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result: Result<ServerMessage, _> = read_message(&mut cursor).await;
    assert!(matches!(result, Err(FrameError::ConnectionClosed)));
}
