//! Error types for agentmq.

use thiserror::Error;

use crate::protocol::Action;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Caller input could not be turned into an action request.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The `action` token is not one we dispatch.
    #[error("Unsupported action: '{0}'")]
    UnsupportedAction(String),

    #[error("Envelope format error: {0}")]
    EnvelopeFormat(String),

    #[error("Broker unavailable during {operation} on queue '{queue}': {reason}")]
    BrokerUnavailable {
        operation: Action,
        queue: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub fn envelope(msg: impl Into<String>) -> Self {
        Error::EnvelopeFormat(msg.into())
    }

    /// Short machine-readable code, used by the CLI and tool output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "malformed_input",
            Error::UnsupportedAction(_) => "unsupported_action",
            Error::EnvelopeFormat(_) => "envelope_format",
            Error::BrokerUnavailable { .. } => "broker_unavailable",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}
