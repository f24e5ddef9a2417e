//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;
use crate::settings::Settings;
use crate::state::{SettingsError, TimerStatus};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current timer status
    GetStatus,

    /// Request current settings
    GetSettings,

    /// Start a session, or resume a paused one
    Start,

    /// Pause the running session
    Pause,

    /// Return to Idle
    Reset,

    SetWorkSeconds { seconds: u32 },

    SetRestSeconds { seconds: u32 },

    SetTotalSets { sets: u32 },

    SetPrepEnabled { enabled: bool },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to event notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current timer status
    Status(TimerStatus),

    /// Settings after a query or an accepted change
    Settings {
        settings: Settings,
        /// Clamp advisory to show the user
        notice: Option<String>,
    },

    /// A settings change was refused; nothing changed
    Rejected { code: String, message: String },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn rejected(error: &SettingsError) -> Self {
        Response::Rejected {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Engine event occurred
    Event { event: SessionEvent },
}
