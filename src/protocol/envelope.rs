//! Metadata envelopes wrapping application content on the wire.
//!
//! Wire format is a flat JSON object:
//!
//! ```json
//! {"sender":"agent-A","receiver":"agent-B","timestamp":"2024-01-01T00:00:00.000000Z","type":"text","content":"hi"}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::types::MessageKind;

/// Message envelope carrying sender, receiver, timestamp, type and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender agent identity
    pub sender: String,
    /// Receiving queue
    pub receiver: String,
    /// ISO-8601 creation time, treated as opaque after decode
    pub timestamp: String,
    /// Message type, e.g. "text"
    #[serde(rename = "type")]
    pub kind: String,
    /// Application payload
    pub content: String,
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: &MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            timestamp: current_timestamp(),
            kind: kind.as_str().to_string(),
            content: content.into(),
        }
    }

    /// Serialize to the wire string.
    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::envelope(e.to_string()))
    }

    /// Parse a wire string, failing when a required field is missing or the
    /// text is not a JSON object.
    pub fn from_wire(wire: &str) -> Result<Self> {
        serde_json::from_str(wire).map_err(|e| Error::envelope(e.to_string()))
    }

    /// Check if this envelope is addressed to a specific queue.
    pub fn is_for(&self, queue_name: &str) -> bool {
        self.receiver == queue_name
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// Wrap `content` into a freshly stamped wire envelope.
pub fn encode(sender: &str, receiver: &str, kind: &MessageKind, content: &str) -> Result<String> {
    Envelope::new(sender, receiver, kind, content).to_wire()
}

/// Unwrap a wire envelope.
pub fn decode(wire: &str) -> Result<Envelope> {
    Envelope::from_wire(wire)
}

/// Returns the parsed envelope when `payload` is already a well-formed
/// envelope, `None` when it is plain application content.
pub fn sniff(payload: &str) -> Option<Envelope> {
    if !payload.trim_start().starts_with('{') {
        return None;
    }
    Envelope::from_wire(payload).ok()
}

fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_preserves_fields() {
        let wire = encode("agent-A", "agent-B", &MessageKind::Text, "Hello World!").unwrap();
        let envelope = decode(&wire).unwrap();

        assert_eq!(envelope.sender, "agent-A");
        assert_eq!(envelope.receiver, "agent-B");
        assert_eq!(envelope.kind, "text");
        assert_eq!(envelope.content, "Hello World!");
        assert!(!envelope.timestamp.is_empty());
    }

    #[test]
    fn test_content_with_awkward_characters() {
        let content = "line1\nline2 \"quoted\" {\"nested\": true} ünïcødé";
        let wire = encode("a", "b", &MessageKind::Custom("note".into()), content).unwrap();
        let envelope = decode(&wire).unwrap();
        assert_eq!(envelope.content, content);
        assert_eq!(envelope.kind, "note");
    }

    #[test]
    fn test_edge_case_fields_round_trip() {
        let cases = [
            ("", "", "", ""),
            (" ", "\n", "\t", "   "),
            ("agent-A", "agent-B", "text", "\n"),
            ("エージェント", "récepteur", "ステータス", "✓ done \u{1F680}"),
            ("a\"b", "c\\d", "{}", "{\"content\":\"nested\"}"),
        ];
        for (sender, receiver, kind, content) in cases {
            let wire = encode(sender, receiver, &MessageKind::Custom(kind.to_string()), content)
                .unwrap();
            let envelope = decode(&wire).unwrap();
            assert_eq!(envelope.sender, sender);
            assert_eq!(envelope.receiver, receiver);
            assert_eq!(envelope.kind, kind);
            assert_eq!(envelope.content, content);
        }
    }

    #[test]
    fn test_timestamp_is_opaque() {
        let wire = r#"{"sender":"agent-C","receiver":"agent-B","timestamp":"2024-01-01T00:00:00","type":"text","content":"hi"}"#;
        let envelope = decode(wire).unwrap();
        assert_eq!(envelope.timestamp, "2024-01-01T00:00:00");
        assert_eq!(envelope.into_content(), "hi");
    }

    #[test]
    fn test_timestamp_regenerated_per_encode() {
        let first = decode(&encode("a", "b", &MessageKind::Text, "x").unwrap()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = decode(&encode("a", "b", &MessageKind::Text, "x").unwrap()).unwrap();
        assert_ne!(first.timestamp, second.timestamp);
        assert!(chrono::DateTime::parse_from_rfc3339(&second.timestamp).is_ok());
    }

    #[test]
    fn test_decode_missing_field() {
        let wire = r#"{"sender":"a","receiver":"b","type":"text","content":"hi"}"#;
        assert!(matches!(decode(wire), Err(Error::EnvelopeFormat(_))));
    }

    #[test]
    fn test_decode_not_json() {
        assert!(matches!(decode("Hello World!"), Err(Error::EnvelopeFormat(_))));
        assert!(matches!(decode("[1,2,3]"), Err(Error::EnvelopeFormat(_))));
    }

    #[test]
    fn test_sniff() {
        let wire = encode("a", "b", &MessageKind::Text, "x").unwrap();
        assert!(sniff(&wire).is_some());
        assert!(sniff("plain text").is_none());
        assert!(sniff(r#"{"content":"only"}"#).is_none());
    }
}
