//! Protocol vocabulary shared by the normalizer, codec and dispatcher.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The two operations a dispatch can perform against a queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Publish one message to a queue
    Send,
    /// Fetch one message from a queue
    Receive,
}

impl Action {
    /// Parse a caller-supplied action token.
    ///
    /// Accepts the tool tokens `send_message` / `receive_message` and the
    /// short forms `send` / `receive`, ignoring ASCII case and surrounding
    /// whitespace.
    pub fn parse(token: &str) -> Result<Self, Error> {
        match token.trim().to_ascii_lowercase().as_str() {
            "send_message" | "send" => Ok(Action::Send),
            "receive_message" | "receive" => Ok(Action::Receive),
            _ => Err(Error::UnsupportedAction(token.to_string())),
        }
    }

    /// Canonical tool token for this action.
    pub fn token(&self) -> &'static str {
        match self {
            Action::Send => "send_message",
            Action::Receive => "receive_message",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Send => write!(f, "send"),
            Action::Receive => write!(f, "receive"),
        }
    }
}

/// Envelope `type` classification.
///
/// The wire field is a free string; these are the kinds agents agree on,
/// anything else travels as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Text,
    Json,
    Command,
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Json => "json",
            MessageKind::Command => "command",
            MessageKind::Custom(s) => s,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "text" => MessageKind::Text,
            "json" => MessageKind::Json,
            "command" => MessageKind::Command,
            other => MessageKind::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
