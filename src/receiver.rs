//! Inbound delivery: the listen / decode / acknowledge state machine.
//!
//! One call to [`receive`] accepts one data message and returns its payload,
//! acknowledging the sender first:
//!
//! ```text
//!   bind on the given port
//!        │
//!        ▼
//!   wait for a datagram (bounded by max_wait) ──deadline──▶ TimeoutError
//!        │
//!   decode + validate ──failure──▶ error (no retry on corrupt input)
//!        │
//!   acknowledgement? → stray noise; discard and keep listening
//!        │
//!   data: release the socket, ACK the declared source, return the payload
//! ```
//!
//! The acknowledgement goes out *before* the payload is handed to the caller,
//! and an acknowledgement failure propagates instead of yielding the payload:
//! an unacknowledged sender will retransmit, so returning the data would hand
//! the application a message its peer still considers undelivered.
//!
//! The operation binds one listening socket and keeps it across stray-message
//! skips, adjusting the read deadline instead of rebinding.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;

use crate::ack::{acknowledge, AckError};
use crate::config::{SharedSecret, BUFFER_SIZE, LOCALHOST};
use crate::message::{CodecError, Message};
use crate::socket::{Socket, SocketError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors reported by a receive attempt.
#[derive(Debug, Error)]
pub enum RecvError {
    /// Socket bind or read failure.  Fatal to the operation.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// No data message arrived within the caller's deadline.
    #[error("no data arrived within {0:?}")]
    Timeout(Duration),
    /// A datagram arrived but was malformed or failed validation.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The data message arrived but could not be acknowledged; the payload is
    /// withheld because the sender will treat the delivery as failed.
    #[error("received data but failed to acknowledge it: {0}")]
    Ack(#[from] AckError),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Listen on `port` (loopback) for one data message, acknowledge it, and
/// return its payload.
///
/// Returns [`RecvError::Timeout`] if nothing valid arrives within `max_wait`.
/// A malformed or corrupt datagram ends the attempt with an error; a stray
/// acknowledgement is discarded and listening continues.
pub async fn receive(
    port: u16,
    max_wait: Duration,
    secret: &SharedSecret,
) -> Result<Vec<u8>, RecvError> {
    let start = Instant::now();
    let socket = Socket::bind(SocketAddr::new(LOCALHOST, port)).await?;
    let mut buf = vec![0u8; BUFFER_SIZE];

    loop {
        let remaining = max_wait.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            log::warn!("[recv] nothing received on port {port} within {max_wait:?}");
            return Err(RecvError::Timeout(max_wait));
        }

        let (n, from) = match timeout(remaining, socket.recv_from(&mut buf)).await {
            Err(_elapsed) => {
                log::warn!("[recv] nothing received on port {port} within {max_wait:?}");
                return Err(RecvError::Timeout(max_wait));
            }
            Ok(result) => result?,
        };

        // Corrupt input ends the attempt; the receiver does not retry.
        let message = Message::decode_unsequenced(&buf[..n], secret)?;

        if message.is_ack {
            log::debug!("[recv] stray acknowledgement from {from}; discarding");
            continue;
        }

        log::debug!(
            "[recv] ← DATA seq={} len={} from {from}",
            message.sequence_number,
            message.payload.len()
        );

        // Release the listening port before acknowledging: the reply goes out
        // from the endpoint the sender addressed, which is this one.
        drop(socket);
        acknowledge(
            message.destination(),
            message.source(),
            message.sequence_number,
            secret,
        )
        .await?;

        return Ok(message.payload);
    }
}
