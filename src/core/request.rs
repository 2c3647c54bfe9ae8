//! Tool input normalization.
//!
//! Callers hand the tool either free text or a parameter map (possibly
//! serialized as a JSON string). Everything is reduced here to one
//! [`ActionRequest`]; nothing downstream looks at the input shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::protocol::{Action, MessageKind};

const QUEUE_KEYS: [&str; 2] = ["queue_name", "queue"];
const PAYLOAD_KEYS: [&str; 3] = ["message", "payload", "content"];

/// Raw caller input.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// Free text to send to the default queue
    Text(String),
    /// Structured parameters
    Params(Map<String, Value>),
}

impl ToolInput {
    /// Classify a JSON tool argument.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Self::from_text(text)),
            Value::Object(map) => Ok(ToolInput::Params(map)),
            Value::Null => Err(Error::malformed("tool input is empty")),
            other => Err(Error::malformed(format!(
                "tool input must be text or an object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Text that is a serialized parameter map (a JSON object with an
    /// `action` key) is treated as parameters; anything else is free text.
    pub fn from_text(text: String) -> Self {
        if text.trim_start().starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
                if map.contains_key("action") {
                    return ToolInput::Params(map);
                }
            }
        }
        ToolInput::Text(text)
    }
}

impl From<&str> for ToolInput {
    fn from(text: &str) -> Self {
        Self::from_text(text.to_string())
    }
}

impl From<String> for ToolInput {
    fn from(text: String) -> Self {
        Self::from_text(text)
    }
}

/// Canonical request handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    pub queue_name: String,
    /// Present for sends; always `None` for receives.
    pub payload: Option<String>,
    pub persistent: bool,
    pub priority: u8,
    /// Envelope type used when the payload gets wrapped.
    #[serde(skip, default)]
    pub kind: MessageKind,
}

impl ActionRequest {
    pub fn send(queue_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            action: Action::Send,
            queue_name: queue_name.into(),
            payload: Some(payload.into()),
            persistent: false,
            priority: 0,
            kind: MessageKind::Text,
        }
    }

    pub fn receive(queue_name: impl Into<String>) -> Self {
        Self {
            action: Action::Receive,
            queue_name: queue_name.into(),
            payload: None,
            persistent: false,
            priority: 0,
            kind: MessageKind::Text,
        }
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Check the request invariants.
    pub fn validate(&self) -> Result<()> {
        if self.queue_name.trim().is_empty() {
            return Err(Error::malformed("queue_name must not be empty"));
        }
        if self.action == Action::Send {
            match self.payload.as_deref() {
                None => return Err(Error::malformed("send_message requires a message")),
                Some(p) if p.is_empty() => {
                    return Err(Error::malformed("send_message requires a non-empty message"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Normalize caller input into a canonical request.
///
/// `default_queue` is used when the caller names no queue.
pub fn normalize(input: ToolInput, default_queue: &str) -> Result<ActionRequest> {
    let request = match input {
        ToolInput::Text(text) => {
            ActionRequest::send(default_queue, text)
        }
        ToolInput::Params(params) => from_params(&params, default_queue)?,
    };

    request.validate()?;
    Ok(request)
}

fn from_params(params: &Map<String, Value>, default_queue: &str) -> Result<ActionRequest> {
    let payload = first_present(params, &PAYLOAD_KEYS).map(payload_text).transpose()?;

    let action = match params.get("action") {
        None | Some(Value::Null) => match payload {
            Some(_) => Action::Send,
            None => return Err(Error::malformed("no action given and no message to send")),
        },
        Some(Value::String(token)) => Action::parse(token)?,
        Some(other) => return Err(Error::UnsupportedAction(other.to_string())),
    };

    let queue_name = match first_present(params, &QUEUE_KEYS) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) | None => default_queue.to_string(),
        Some(other) => {
            return Err(Error::malformed(format!(
                "queue_name must be a string, got {}",
                json_type(other)
            )))
        }
    };

    let kind = match params.get("type") {
        Some(Value::String(kind)) if !kind.is_empty() => MessageKind::from(kind.as_str()),
        _ => MessageKind::Text,
    };

    Ok(ActionRequest {
        action,
        queue_name,
        payload: match action {
            Action::Send => payload,
            Action::Receive => None,
        },
        persistent: persistent_flag(params.get("persistent"))?,
        priority: priority_level(params.get("priority"))?,
        kind,
    })
}

/// First key whose value is present and not null.
fn first_present<'a>(params: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find(|value| !value.is_null())
}

fn payload_text(value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string(other)
            .map_err(|e| Error::malformed(format!("message is not serializable: {}", e))),
    }
}

fn persistent_flag(value: Option<&Value>) -> Result<bool> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            _ => Err(Error::malformed(format!("persistent must be a boolean, got '{}'", text))),
        },
        Some(other) => Err(Error::malformed(format!(
            "persistent must be a boolean, got {}",
            json_type(other)
        ))),
    }
}

fn priority_level(value: Option<&Value>) -> Result<u8> {
    fn out_of_range(raw: impl std::fmt::Display) -> Error {
        Error::malformed(format!("priority must be an integer in 0..=255, got {}", raw))
    }

    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| out_of_range(n)),
        Some(Value::String(text)) => text.trim().parse::<u8>().map_err(|_| out_of_range(text)),
        Some(other) => Err(out_of_range(json_type(other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
