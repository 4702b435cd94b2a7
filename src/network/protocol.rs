//! Network Protocol
//!
//! Message types for client-server communication. JSON text frames with a
//! `type` tag are the primary format; the flat [`InputMessage`] also has a
//! compact bincode form for binary frames.

use serde::{Serialize, Deserialize};

use crate::game::input::InputFrame;
use crate::game::session::PlayerId;
use crate::network::snapshot::Snapshot;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attach to a free core.
    Join(JoinRequest),

    /// Latest held keys.
    Input(InputMessage),

    /// Latency check.
    Ping {
        /// Client timestamp, echoed back
        timestamp: u64,
    },
}

/// Join request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Display name (trimmed and truncated server-side)
    #[serde(default)]
    pub name: String,
}

/// Held keys plus an optional respawn request and name change.
///
/// Missing keys read as released.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputMessage {
    /// Up key held
    pub up: bool,
    /// Down key held
    pub down: bool,
    /// Left key held
    pub left: bool,
    /// Right key held
    pub right: bool,
    /// Revive a dead core
    pub respawn: bool,
    /// Display name update
    pub name: Option<String>,
}

impl InputMessage {
    /// Pack the keys into an input frame.
    pub fn to_input_frame(&self) -> InputFrame {
        InputFrame::from_keys(self.up, self.down, self.left, self.right)
            .with_respawn(self.respawn)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome(WelcomeInfo),

    /// Per-recipient world view.
    Snapshot(Snapshot),

    /// Reply to ping.
    Pong {
        /// Echoed client timestamp
        timestamp: u64,
        /// Server wall clock (Unix ms)
        #[serde(rename = "serverTime")]
        server_time: i64,
    },

    /// Request could not be handled.
    Error(ServerError),

    /// Server is going away.
    Shutdown {
        /// Reason for shutdown
        reason: String,
    },
}

/// Connection greeting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeInfo {
    /// Connection (and player) id
    pub id: PlayerId,
    /// Server version
    pub version: String,
    /// Spawn protection (ms)
    pub safe_time: f64,
}

/// Server error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

impl ServerError {
    /// Build an error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed
    InvalidInput,
    /// Connection limit reached
    ServerFull,
    /// Internal error
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Pong stamped with the current server time.
    pub fn pong(timestamp: u64) -> Self {
        ServerMessage::Pong {
            timestamp,
            server_time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
