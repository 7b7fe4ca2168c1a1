//! Wire-format definitions for protocol datagrams.
//!
//! Every datagram exchanged between peers is a [`Message`].  This module is
//! responsible for:
//! - Defining the wire record (sequence number, payload, integrity code,
//!   declared length, endpoints).
//! - Building data messages and acknowledgements with a correct length and
//!   integrity code.
//! - Serialising a [`Message`] to self-describing JSON and parsing it back.
//! - Validating sequence number, declared length, and integrity code on
//!   decode, reporting each check's outcome independently.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! A field-tagged JSON object so either side can evolve independently:
//!
//! ```json
//! {
//!   "sequenceNumber": 1234567890123456789,
//!   "payload": [104, 101, 108, 108, 111],
//!   "isAcknowledgement": false,
//!   "length": 5,
//!   "integrityCode": 3735928559,
//!   "sourceAddress": "127.0.0.1",
//!   "sourcePort": 54321,
//!   "destinationAddress": "127.0.0.1",
//!   "destinationPort": 7777
//! }
//! ```
//!
//! `integrityCode` is CRC-32 (IEEE) over `payload ‖ secret`.  `length` repeats
//! the payload length so truncation and length tampering are caught even when
//! the checksum happens to collide.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SharedSecret, ACK_FILLER_LEN};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Outcome of the three decode-time checks, recorded independently.
///
/// A caller may need to tell "wrong peer" apart from "corrupted data": a
/// sender that sees an otherwise-valid acknowledgement whose only fault is a
/// sequence mismatch is looking at the echo of an earlier attempt, not at
/// corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckFailure {
    /// The sequence number did not match the expected value.
    pub sequence_mismatch: bool,
    /// The declared `length` field disagrees with the actual payload size.
    pub length_mismatch: bool,
    /// The integrity code did not match the recomputed CRC.
    pub integrity_mismatch: bool,
    /// Discriminator of the record that failed, as declared on the wire.
    pub is_ack: bool,
}

impl CheckFailure {
    fn any(&self) -> bool {
        self.sequence_mismatch || self.length_mismatch || self.integrity_mismatch
    }

    /// `true` when the record is a structurally sound acknowledgement whose
    /// only fault is carrying a different sequence number — i.e. the reply to
    /// an earlier, superseded transmission.
    pub fn stale_ack(&self) -> bool {
        self.is_ack && self.sequence_mismatch && !self.length_mismatch && !self.integrity_mismatch
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut failed = Vec::new();
        if self.sequence_mismatch {
            failed.push("sequence number");
        }
        if self.length_mismatch {
            failed.push("declared length");
        }
        if self.integrity_mismatch {
            failed.push("integrity code");
        }
        write!(f, "{} mismatch", failed.join(" + "))
    }
}

/// Errors that can arise while building, encoding, or decoding a [`Message`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes could not be parsed into a well-formed record.
    #[error("datagram is not a well-formed message: {0}")]
    Format(#[from] serde_json::Error),
    /// The record parsed but failed one or more validity checks.
    #[error("message failed validation: {0}")]
    Check(CheckFailure),
    /// The OS randomness source could not supply acknowledgement filler bytes.
    #[error("randomness source failed: {0}")]
    Randomness(#[from] rand::Error),
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol datagram: either a data message or an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Random 64-bit identifier drawn by the sender of a data message.
    /// An acknowledgement echoes the sequence number it confirms.
    pub sequence_number: u64,
    /// Caller-supplied content for data messages; random filler for
    /// acknowledgements (see [`Message::ack`]).
    pub payload: Vec<u8>,
    /// Discriminator between data and acknowledgement.
    #[serde(rename = "isAcknowledgement")]
    pub is_ack: bool,
    /// Declared payload length, validated against `payload` on decode.
    pub length: usize,
    /// CRC-32 over `payload ‖ secret`, recomputed and compared on decode.
    pub integrity_code: u32,
    /// Address the datagram was sent from.
    pub source_address: IpAddr,
    /// Port the sender listens on for the reply.
    pub source_port: u16,
    /// Address the datagram is aimed at.
    pub destination_address: IpAddr,
    /// Port the datagram is aimed at.
    pub destination_port: u16,
}

impl Message {
    /// Build a data message carrying `payload`.
    ///
    /// `length` and `integrity_code` are computed here; the caller supplies
    /// everything else.
    pub fn data(
        sequence_number: u64,
        payload: Vec<u8>,
        source: SocketAddr,
        destination: SocketAddr,
        secret: &SharedSecret,
    ) -> Self {
        Self::build(sequence_number, payload, false, source, destination, secret)
    }

    /// Build an acknowledgement confirming `sequence_number`.
    ///
    /// The payload is [`ACK_FILLER_LEN`] bytes from the OS randomness source.
    /// An empty (or constant) payload would let an observer collect the
    /// integrity code of a known plaintext from every acknowledgement and
    /// work on the secret offline; random filler closes that hole.
    pub fn ack(
        sequence_number: u64,
        source: SocketAddr,
        destination: SocketAddr,
        secret: &SharedSecret,
    ) -> Result<Self, CodecError> {
        let mut filler = vec![0u8; ACK_FILLER_LEN];
        OsRng.try_fill_bytes(&mut filler)?;
        Ok(Self::build(
            sequence_number,
            filler,
            true,
            source,
            destination,
            secret,
        ))
    }

    fn build(
        sequence_number: u64,
        payload: Vec<u8>,
        is_ack: bool,
        source: SocketAddr,
        destination: SocketAddr,
        secret: &SharedSecret,
    ) -> Self {
        let length = payload.len();
        let integrity_code = integrity_code(&payload, secret);
        Self {
            sequence_number,
            payload,
            is_ack,
            length,
            integrity_code,
            source_address: source.ip(),
            source_port: source.port(),
            destination_address: destination.ip(),
            destination_port: destination.port(),
        }
    }

    /// The declared origin endpoint (where acknowledgements must be sent).
    pub fn source(&self) -> SocketAddr {
        SocketAddr::new(self.source_address, self.source_port)
    }

    /// The declared target endpoint.
    pub fn destination(&self) -> SocketAddr {
        SocketAddr::new(self.destination_address, self.destination_port)
    }

    /// Serialise this message into its JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a [`Message`] from raw bytes without running validity checks.
    ///
    /// Returns [`CodecError::Format`] if the bytes are not a well-formed
    /// record.  Most callers want [`decode_expecting`](Self::decode_expecting)
    /// or [`decode_unsequenced`](Self::decode_unsequenced) instead.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse and fully validate: sequence number against `expected`, declared
    /// length against the payload, and integrity code against the recomputed
    /// CRC.  All three checks run regardless of earlier failures so the
    /// resulting [`CheckFailure`] names every fault.
    pub fn decode_expecting(
        bytes: &[u8],
        expected: u64,
        secret: &SharedSecret,
    ) -> Result<Self, CodecError> {
        Self::decode(bytes)?.validated(Some(expected), secret)
    }

    /// Parse and validate length and integrity only, for listeners that do
    /// not yet know which sequence number to expect.
    pub fn decode_unsequenced(bytes: &[u8], secret: &SharedSecret) -> Result<Self, CodecError> {
        Self::decode(bytes)?.validated(None, secret)
    }

    fn validated(self, expected: Option<u64>, secret: &SharedSecret) -> Result<Self, CodecError> {
        let failure = CheckFailure {
            sequence_mismatch: expected.is_some_and(|seq| self.sequence_number != seq),
            length_mismatch: self.payload.len() != self.length,
            integrity_mismatch: self.integrity_code != integrity_code(&self.payload, secret),
            is_ack: self.is_ack,
        };
        if failure.any() {
            return Err(CodecError::Check(failure));
        }
        Ok(self)
    }
}

/// CRC-32 (IEEE) over `payload ‖ secret`.
fn integrity_code(payload: &[u8], secret: &SharedSecret) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.update(secret.as_bytes());
    hasher.finalize()
}
