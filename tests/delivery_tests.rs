//! Integration tests for reliable delivery over loopback.
//!
//! Each test spins up real UDP endpoints on 127.0.0.1.  Sender and receiver
//! run as separate tokio tasks so both state machines make progress
//! concurrently, exactly as they would across processes.

use std::time::{Duration, Instant};

use tokio::net::UdpSocket;

use reliable_udp::config::{MAX_WAIT_TIME, SECRET_LEN, WAIT_TIME};
use reliable_udp::message::{CodecError, Message};
use reliable_udp::receiver::RecvError;
use reliable_udp::sender::SendError;
use reliable_udp::{receive, send_reliable, send_reliable_from_port, SharedSecret};

const LOCALHOST: std::net::IpAddr = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

fn test_secret() -> SharedSecret {
    SharedSecret::from([1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
}

/// Reserve a currently free loopback port by binding to port 0 and releasing
/// the socket again.
async fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    socket.local_addr().expect("local_addr").port()
}

/// Give a freshly spawned listener time to bind before sending at it.
async fn let_listener_bind() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// ---------------------------------------------------------------------------
// Test 1: end-to-end delivery of "hello"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_end_to_end_delivery() {
    let port = free_port().await;

    let server = tokio::spawn(async move {
        receive(port, Duration::from_secs(10), &test_secret()).await
    });

    let_listener_bind().await;
    let started = Instant::now();
    send_reliable(b"hello", LOCALHOST, LOCALHOST, port, &test_secret())
        .await
        .expect("delivery should be confirmed");

    // With a live receiver the acknowledgement arrives well inside one
    // retransmission window.
    assert!(started.elapsed() < WAIT_TIME, "delivery took too long");

    let payload = server.await.unwrap().expect("server receive");
    assert_eq!(payload, b"hello");
}

// ---------------------------------------------------------------------------
// Test 2: fixed-source-port variant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delivery_from_fixed_port() {
    let server_port = free_port().await;
    let client_port = free_port().await;

    let server = tokio::spawn(async move {
        receive(server_port, Duration::from_secs(10), &test_secret()).await
    });

    let_listener_bind().await;
    send_reliable_from_port(
        b"pinned",
        LOCALHOST,
        client_port,
        LOCALHOST,
        server_port,
        &test_secret(),
    )
    .await
    .expect("delivery from fixed port");

    assert_eq!(server.await.unwrap().expect("server receive"), b"pinned");
}

// ---------------------------------------------------------------------------
// Test 3: a stray acknowledgement is discarded, listening continues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stray_ack_is_discarded() {
    let port = free_port().await;

    let server = tokio::spawn(async move {
        receive(port, Duration::from_secs(10), &test_secret()).await
    });
    let_listener_bind().await;

    // Protocol noise: an acknowledgement nobody asked for.
    let noise = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let stray = Message::ack(
        999,
        noise.local_addr().unwrap(),
        format!("127.0.0.1:{port}").parse().unwrap(),
        &test_secret(),
    )
    .expect("build stray ack");
    noise
        .send_to(&stray.encode().unwrap(), ("127.0.0.1", port))
        .await
        .expect("send stray ack");

    tokio::time::sleep(Duration::from_millis(100)).await;
    send_reliable(b"real data", LOCALHOST, LOCALHOST, port, &test_secret())
        .await
        .expect("delivery after stray ack");

    assert_eq!(server.await.unwrap().expect("server receive"), b"real data");
}

// ---------------------------------------------------------------------------
// Test 4: sender times out when nobody acknowledges, within bounds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sender_timeout_is_bounded() {
    // Nothing listens on this port; every transmission vanishes.
    let port = free_port().await;

    let started = Instant::now();
    let result = send_reliable(b"void", LOCALHOST, LOCALHOST, port, &test_secret()).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(SendError::Timeout)));
    assert!(elapsed >= MAX_WAIT_TIME, "gave up early: {elapsed:?}");
    assert!(
        elapsed < MAX_WAIT_TIME + WAIT_TIME,
        "overran the deadline: {elapsed:?}"
    );
}

// ---------------------------------------------------------------------------
// Test 5: acknowledgements for the wrong sequence never confirm delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sequence_isolation() {
    let port = free_port().await;

    // A rogue peer that acknowledges every message with the wrong sequence
    // number, including each retransmission.
    let rogue = tokio::spawn(async move {
        let socket = UdpSocket::bind(("127.0.0.1", port)).await.expect("bind");
        let mut buf = vec![0u8; 4096];
        loop {
            let (n, _) = socket.recv_from(&mut buf).await.expect("recv");
            let message = Message::decode(&buf[..n]).expect("decode");
            let bad_ack = Message::ack(
                message.sequence_number.wrapping_add(1),
                socket.local_addr().unwrap(),
                message.source(),
                &test_secret(),
            )
            .expect("build ack");
            socket
                .send_to(&bad_ack.encode().unwrap(), message.source())
                .await
                .expect("send ack");
        }
    });

    let_listener_bind().await;
    let started = Instant::now();
    let result = send_reliable(b"unlucky", LOCALHOST, LOCALHOST, port, &test_secret()).await;
    let elapsed = started.elapsed();
    rogue.abort();

    assert!(
        matches!(result, Err(SendError::Timeout)),
        "a mismatched acknowledgement must never confirm delivery"
    );
    assert!(elapsed >= MAX_WAIT_TIME && elapsed < MAX_WAIT_TIME + WAIT_TIME);
}

// ---------------------------------------------------------------------------
// Test 6: receiver deadline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_times_out_when_silent() {
    let port = free_port().await;
    let max_wait = Duration::from_millis(300);

    let started = Instant::now();
    let result = receive(port, max_wait, &test_secret()).await;

    assert!(matches!(result, Err(RecvError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// ---------------------------------------------------------------------------
// Test 7: corrupt input ends the receive attempt with an error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_rejects_garbage() {
    let port = free_port().await;

    let server = tokio::spawn(async move {
        receive(port, Duration::from_secs(5), &test_secret()).await
    });
    let_listener_bind().await;

    let noise = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    noise
        .send_to(b"definitely not json", ("127.0.0.1", port))
        .await
        .expect("send garbage");

    assert!(matches!(
        server.await.unwrap(),
        Err(RecvError::Codec(CodecError::Format(_)))
    ));
}

// ---------------------------------------------------------------------------
// Test 8: an unacknowledgeable delivery withholds the payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_ack_failure_withholds_payload() {
    let port = free_port().await;

    let server = tokio::spawn(async move {
        receive(port, Duration::from_secs(5), &test_secret()).await
    });
    let_listener_bind().await;

    // A valid data message whose declared destination is an address this
    // host cannot bind (TEST-NET-1), so the reply socket cannot be opened.
    let peer = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let unanswerable = Message::data(
        77,
        b"orphaned".to_vec(),
        peer.local_addr().unwrap(),
        format!("192.0.2.1:{port}").parse().unwrap(),
        &test_secret(),
    );
    peer.send_to(&unanswerable.encode().unwrap(), ("127.0.0.1", port))
        .await
        .expect("send data");

    // The payload was received but the sender will never see it confirmed,
    // so the receiver must report the failure instead of returning it.
    assert!(matches!(server.await.unwrap(), Err(RecvError::Ack(_))));
}

// ---------------------------------------------------------------------------
// Test 9: a forged integrity code is an error, not a delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_rejects_wrong_secret() {
    let port = free_port().await;

    let server = tokio::spawn(async move {
        receive(port, Duration::from_secs(5), &test_secret()).await
    });
    let_listener_bind().await;

    // A sender that holds the wrong secret: structurally fine, bad CRC.
    let other_secret = SharedSecret::from([0; SECRET_LEN]);
    let forger = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let forged = Message::data(
        1,
        b"forged".to_vec(),
        forger.local_addr().unwrap(),
        format!("127.0.0.1:{port}").parse().unwrap(),
        &other_secret,
    );
    forger
        .send_to(&forged.encode().unwrap(), ("127.0.0.1", port))
        .await
        .expect("send forged");

    match server.await.unwrap() {
        Err(RecvError::Codec(CodecError::Check(failure))) => {
            assert!(failure.integrity_mismatch);
        }
        other => panic!("expected an integrity failure, got {other:?}"),
    }
}
