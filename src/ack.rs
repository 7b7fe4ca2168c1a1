//! Acknowledgement transmission over a transient socket.
//!
//! Acknowledging a message is a one-shot operation with no state of its own:
//! bind, build, send, release.  It lives in its own module because it is the
//! one piece of send-side machinery the receive path also depends on.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::SharedSecret;
use crate::message::{CodecError, Message};
use crate::socket::{Socket, SocketError};

/// Errors that can arise while sending an acknowledgement.
#[derive(Debug, Error)]
pub enum AckError {
    /// Binding the transient socket or transmitting the datagram failed.
    #[error("acknowledgement transport failed: {0}")]
    Socket(#[from] SocketError),
    /// The acknowledgement could not be built (randomness source failure).
    #[error("acknowledgement construction failed: {0}")]
    Codec(#[from] CodecError),
}

/// Send an acknowledgement for `sequence_number` from `local` to `remote`.
///
/// `local` with port `0` means the OS assigns the port; the message always
/// carries the port actually bound, so the peer sees a truthful source
/// endpoint.  The socket is released as soon as the datagram is on the wire.
pub async fn acknowledge(
    local: SocketAddr,
    remote: SocketAddr,
    sequence_number: u64,
    secret: &SharedSecret,
) -> Result<(), AckError> {
    let socket = Socket::bind(local).await?;
    let message = Message::ack(sequence_number, socket.local_addr, remote, secret)?;
    socket.send_message(&message, remote).await?;
    log::debug!(
        "[ack] → ACK seq={sequence_number} {} → {remote}",
        socket.local_addr
    );
    Ok(())
}
