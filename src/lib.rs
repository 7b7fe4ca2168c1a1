//! `reliable-udp` — confirmed delivery of single messages over UDP.
//!
//! UDP is fire-and-forget: a datagram may be lost, corrupted, or answered by
//! noise, and the sender never learns which.  This crate layers just enough
//! protocol on top to turn one send into a request/response exchange:
//!
//! ```text
//!  ┌────────┐   DATA (seq, payload, crc)   ┌──────────┐
//!  │ Sender │─────────────────────────────▶│ Receiver │
//!  └───┬────┘                              └────┬─────┘
//!      │          ACK (echoes seq)              │
//!      │◀───────────────────────────────────────┘
//!      │
//!      └── retransmit on timeout or invalid reply,
//!          bounded by an overall deadline
//! ```
//!
//! Every datagram is a JSON-encoded [`message::Message`] carrying a random
//! 64-bit sequence number, the declared payload length, and a CRC-32 computed
//! over the payload and a shared secret.  The receiver validates all of it
//! before acknowledging; the sender accepts only an acknowledgement matching
//! its most recent transmission.
//!
//! Each module has a single responsibility:
//! - [`message`]  — wire record: build, encode, decode, validate
//! - [`sender`]   — transmit / await-ACK / retransmit state machine
//! - [`receiver`] — listen / decode / acknowledge state machine
//! - [`ack`]      — transient-socket acknowledgement transmission
//! - [`socket`]   — async UDP socket abstraction
//! - [`config`]   — protocol constants and the shared-secret key file

pub mod ack;
pub mod config;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod socket;

pub use config::SharedSecret;
pub use message::Message;
pub use receiver::receive;
pub use sender::{send_reliable, send_reliable_from_port};
