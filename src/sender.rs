//! Outbound delivery: the transmit / await-ACK / retransmit state machine.
//!
//! One call to [`send_reliable`] delivers one payload and blocks until the
//! peer confirms receipt or the overall deadline passes:
//!
//! ```text
//!   transmit DATA (fresh random seq)
//!        │
//!        ▼
//!   wait ≤ WAIT_TIME for a reply ──timeout──▶ retransmit (new seq), rewait
//!        │                                         ▲
//!   validated ACK, seq matches → success           │
//!   stale ACK (older seq)      → keep waiting      │
//!   anything else              ────────────────────┘
//!
//!   overall: give up MAX_WAIT_TIME after the first transmission
//! ```
//!
//! Every retransmission is a *new* message with a freshly drawn sequence
//! number, and only an acknowledgement of the most recent one counts.  This
//! keeps a slow acknowledgement of attempt N from being mistaken for
//! confirmation of attempt N+1, at the cost of re-delivering the payload when
//! an acknowledgement is merely late (the protocol confirms delivery at
//! least once, not exactly once).
//!
//! The operation binds one socket and keeps it for all attempts, adjusting
//! the read deadline instead of rebinding; the port stays stable, so every
//! attempt advertises the same reply endpoint.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use rand::Rng;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::{SharedSecret, BUFFER_SIZE, MAX_WAIT_TIME, WAIT_TIME};
use crate::message::{CodecError, Message};
use crate::socket::{Socket, SocketError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors reported by a delivery attempt.
#[derive(Debug, Error)]
pub enum SendError {
    /// Socket bind, read, or write failure.  Fatal to the operation.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// No matching acknowledgement arrived before the overall deadline.
    #[error("peer did not acknowledge within the overall deadline")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Deliver `payload` to `destination_address:destination_port` and wait for
/// the peer's acknowledgement.
///
/// The local port is OS-assigned; the engine discovers the actual port after
/// binding and advertises it as the reply endpoint.  Returns once a validated
/// acknowledgement of the current attempt arrives, or [`SendError::Timeout`]
/// after [`MAX_WAIT_TIME`] (total time is bounded above by
/// `MAX_WAIT_TIME + WAIT_TIME`, since the last sub-wait may straddle the
/// deadline).
pub async fn send_reliable(
    payload: &[u8],
    source_address: IpAddr,
    destination_address: IpAddr,
    destination_port: u16,
    secret: &SharedSecret,
) -> Result<(), SendError> {
    deliver(payload, source_address, 0, destination_address, destination_port, secret).await
}

/// Like [`send_reliable`], but transmit from the caller-supplied
/// `source_port` instead of an ephemeral one.
pub async fn send_reliable_from_port(
    payload: &[u8],
    source_address: IpAddr,
    source_port: u16,
    destination_address: IpAddr,
    destination_port: u16,
    secret: &SharedSecret,
) -> Result<(), SendError> {
    deliver(
        payload,
        source_address,
        source_port,
        destination_address,
        destination_port,
        secret,
    )
    .await
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

async fn deliver(
    payload: &[u8],
    source_address: IpAddr,
    source_port: u16,
    destination_address: IpAddr,
    destination_port: u16,
    secret: &SharedSecret,
) -> Result<(), SendError> {
    let socket = Socket::bind(SocketAddr::new(source_address, source_port)).await?;
    let local = socket.local_addr; // actual port, even when OS-assigned
    let peer = SocketAddr::new(destination_address, destination_port);

    let mut message = transmit(&socket, payload, local, peer, secret).await?;
    let start = Instant::now();
    let mut buf = vec![0u8; BUFFER_SIZE];

    loop {
        if start.elapsed() >= MAX_WAIT_TIME {
            log::error!("[send] giving up on {peer}: no acknowledgement in {MAX_WAIT_TIME:?}");
            return Err(SendError::Timeout);
        }

        // One retransmission window.  Stale acknowledgements burn wait time
        // but do not restart the window or trigger a retransmit.
        let window_ends = Instant::now() + WAIT_TIME;
        'window: loop {
            let remaining = window_ends.saturating_duration_since(Instant::now());
            let (n, _from) = match timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_elapsed) => {
                    log::warn!(
                        "[send] seq={} unacknowledged after {WAIT_TIME:?}; retransmitting",
                        message.sequence_number
                    );
                    message = transmit(&socket, payload, local, peer, secret).await?;
                    break 'window;
                }
                Ok(Ok(received)) => received,
                Ok(Err(e)) => return Err(e.into()),
            };

            match Message::decode_expecting(&buf[..n], message.sequence_number, secret) {
                Ok(reply) if reply.is_ack => {
                    log::debug!("[send] ← ACK seq={}; delivery confirmed", reply.sequence_number);
                    return Ok(());
                }
                Ok(reply) => {
                    // Validated, right sequence number, but not an
                    // acknowledgement: the peer is confused.  Retransmit.
                    log::warn!(
                        "[send] expected ACK, got a data message (seq={}); retransmitting",
                        reply.sequence_number
                    );
                    message = transmit(&socket, payload, local, peer, secret).await?;
                    break 'window;
                }
                Err(CodecError::Check(failure)) if failure.stale_ack() => {
                    // Echo of a superseded attempt; wait out the window.
                    log::debug!("[send] ignoring acknowledgement of a stale attempt");
                    continue 'window;
                }
                Err(e) => {
                    log::warn!("[send] discarding invalid reply ({e}); retransmitting");
                    message = transmit(&socket, payload, local, peer, secret).await?;
                    break 'window;
                }
            }
        }
    }
}

/// Build a fresh data message (new random sequence number) and put it on the
/// wire.  Called for the first transmission and for every retransmit.
async fn transmit(
    socket: &Socket,
    payload: &[u8],
    local: SocketAddr,
    peer: SocketAddr,
    secret: &SharedSecret,
) -> Result<Message, SendError> {
    let sequence_number = rand::thread_rng().gen::<u64>();
    let message = Message::data(sequence_number, payload.to_vec(), local, peer, secret);
    socket.send_message(&message, peer).await?;
    log::debug!(
        "[send] → DATA seq={sequence_number} len={} {local} → {peer}",
        payload.len()
    );
    Ok(message)
}
