//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::message::Message`] on the way out and raw bytes on the way in —
//! inbound datagrams are handed back undecoded because validation depends on
//! context the socket does not have (whether a sequence number is expected,
//! and which one).  All protocol logic lives elsewhere; this module owns only
//! byte I/O.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::message::{CodecError, Message};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The outbound message could not be serialised.
    #[error("message encode error: {0}")]
    Encode(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async UDP socket that sends [`Message`]s.
///
/// All methods are `&self`; the socket holds no protocol state.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port, so it is always the *actual* local endpoint).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Port `0` lets the OS choose an ephemeral port; `local_addr` on the
    /// returned socket reflects the port actually assigned.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `message` and send it as a single datagram to `dest`.
    pub async fn send_message(
        &self,
        message: &Message,
        dest: SocketAddr,
    ) -> Result<(), SocketError> {
        let bytes = message.encode()?;
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram into `buf`.
    ///
    /// Returns the datagram length and the peer address.  Decoding is the
    /// caller's job; see the module docs for why.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        let (n, addr) = self.inner.recv_from(buf).await?;
        Ok((n, addr))
    }
}
