//! pico-protocol: wire types and framing for the PICORadar position-sharing protocol.
//!
//! Every application-level message is a discriminated union serialized as a
//! single self-describing JSON document using a top-level `type` field. The
//! transport (a WebSocket connection in `services/server`) supplies message
//! framing; this crate only serializes/parses the payload of one frame.

mod player_id;
mod pose;

pub use player_id::{PlayerId, PlayerIdError};
pub use pose::Pose;

use serde::{Deserialize, Serialize};

/// Maximum encoded size of a single message, in bytes. Oversized inbound
/// messages are a protocol violation and cause the session to close rather
/// than being truncated or buffered.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// A client's request to authenticate a freshly-opened connection.
///
/// Sent at most once per connection, and must be the first message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub player_id: String,
    pub token: String,
}

/// The server's reply to an `AuthRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub ok: bool,
    #[serde(default)]
    pub reason: String,
}

/// One pose update from an authenticated peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    pub pose: Pose,
}

/// One entry in a `RosterUpdate`'s player list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: String,
    pub pose: Pose,
}

/// The complete roster snapshot, fanned out to every authenticated session
/// on each broadcaster tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterUpdate {
    pub players: Vec<RosterEntry>,
}

/// All message kinds exchanged over a PICORadar session.
///
/// Serializes/deserializes using the `type` field as a tag, e.g.
/// `{"type": "auth_request", "player_id": "...", "token": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Message {
    AuthRequest(AuthRequest),
    AuthResponse(AuthResponse),
    PoseUpdate(PoseUpdate),
    RosterUpdate(RosterUpdate),
}

/// Reasons a Session transitions to Draining; also used as the slow-consumer
/// and protocol-violation log markers.
pub mod close_reasons {
    pub const POLICY_VIOLATION: &str = "policy-violation";
    pub const BAD_TOKEN: &str = "bad-token";
    pub const AUTH_TIMEOUT: &str = "auth-timeout";
    pub const SUPERSEDED: &str = "superseded";
    pub const SLOW_CONSUMER: &str = "slow-consumer";
    pub const PEER_CLOSED: &str = "peer-closed";
    pub const TRANSPORT_ERROR: &str = "transport-error";
    pub const SHUTDOWN: &str = "shutdown";
}

/// Failure to parse a byte buffer as a [`Message`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    Oversized { len: usize, max: usize },
    #[error("truncated message buffer")]
    Truncated,
    #[error("buffer is not valid UTF-8")]
    InvalidUtf8,
    #[error("unrecognized message variant or malformed JSON: {0}")]
    Malformed(String),
}

/// Encode a [`Message`] to its wire representation.
///
/// Total and pure: never fails, never panics on any value a caller can
/// construct from this crate's public types.
pub fn encode(message: &Message) -> Vec<u8> {
    serde_json::to_vec(message).expect("Message serialization is infallible")
}

/// Parse a byte buffer produced by [`encode`] (or an equivalent peer
/// implementation) back into a [`Message`].
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    if bytes.len() > MAX_MESSAGE_BYTES {
        return Err(DecodeError::Oversized {
            len: bytes.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }
    if bytes.is_empty() {
        return Err(DecodeError::Truncated);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))
}
