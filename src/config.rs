//! Protocol constants and the shared-secret key file.
//!
//! Everything here is established once at process start and never mutated:
//! the engines receive the [`SharedSecret`] by reference and read the
//! constants directly.  None of it is runtime-tunable.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Receive-buffer size for a single datagram.
pub const BUFFER_SIZE: usize = 4096;

/// Overall deadline for one delivery: once this much time has passed since
/// the first transmission, the sender gives up.
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(5);

/// Sub-deadline for one receive attempt; each expiry triggers a retransmit.
pub const WAIT_TIME: Duration = Duration::from_secs(2);

/// Length of the random filler carried by acknowledgement payloads.
pub const ACK_FILLER_LEN: usize = 32;

/// Length of the shared secret in bytes.
pub const SECRET_LEN: usize = 10;

/// Default location of the shared-secret key file.
pub const DEFAULT_KEY_FILE: &str = "resource/private_key.json";

/// Loopback address used by the bundled server and client modes.
pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

// ---------------------------------------------------------------------------
// Shared secret
// ---------------------------------------------------------------------------

/// Errors raised while loading the shared-secret key file.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The key file could not be read.
    #[error("cannot read key file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON, or `private_key` is missing or does not
    /// hold exactly [`SECRET_LEN`] tokens.
    #[error("malformed key file: {0}")]
    Json(#[from] serde_json::Error),
    /// A token does not name a value in `0..=255`.
    #[error("key token {index} ({token:?}) is not a byte value")]
    BadToken { index: usize, token: String },
}

/// The process-wide shared secret mixed into every integrity code.
///
/// Deters trivial forgery of the integrity code by third parties; it is not
/// encryption and does not hide payload contents.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SECRET_LEN]);

impl SharedSecret {
    /// Load the secret from a JSON key file:
    ///
    /// ```json
    /// { "private_key": ["0x1f", "200", "3", ...] }
    /// ```
    ///
    /// `private_key` must hold exactly [`SECRET_LEN`] tokens, each a decimal,
    /// `0x`-hex, or `0o`-octal string naming one byte.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecretError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Parse the secret from the key-file JSON text.
    pub fn from_json(json: &str) -> Result<Self, SecretError> {
        #[derive(Deserialize)]
        struct KeyFile {
            private_key: [String; SECRET_LEN],
        }

        let file: KeyFile = serde_json::from_str(json)?;
        let mut bytes = [0u8; SECRET_LEN];
        for (index, token) in file.private_key.iter().enumerate() {
            bytes[index] = parse_byte_token(token).ok_or_else(|| SecretError::BadToken {
                index,
                token: token.clone(),
            })?;
        }
        Ok(Self(bytes))
    }

    /// The raw secret bytes, appended to payloads when computing integrity codes.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }
}

impl From<[u8; SECRET_LEN]> for SharedSecret {
    fn from(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret(..)")
    }
}

/// Parse one key-file token as a byte.  Accepts decimal, `0x` hex, and
/// `0o` octal, mirroring base-0 integer parsing.
fn parse_byte_token(token: &str) -> Option<u8> {
    let value = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = token.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()?
    } else {
        token.parse::<u64>().ok()?
    };
    u8::try_from(value).ok()
}
