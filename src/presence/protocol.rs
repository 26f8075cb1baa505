//! Live-connection frames.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Frames a client sends over a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Asserts the connection's identity with a session token.
    Authenticate(String),
    /// Asks for a fresh statistics broadcast.
    Statistics,
    /// Any other `type`.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Parses a text frame. Unparseable payloads yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match sonic_rs::from_str::<ClientFrame>(raw) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!("Ignoring malformed frame: {}", e);
                None
            }
        }
    }
}

/// Snapshot of live statistics for one connected user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub nb_connected_users: usize,
    pub nb_posts: i64,
    pub nb_views: i64,
}

/// Frames the server pushes over a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    Statistics(Statistics),
}

impl ServerFrame {
    /// Encodes the frame as JSON text.
    pub fn to_json(&self) -> Result<String> {
        sonic_rs::to_string(self)
            .map_err(|e| AppError::Internal(format!("Frame serialization failed: {}", e)))
    }
}
