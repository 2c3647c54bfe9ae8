//! Caller-facing tool entry point.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{normalize, ActionRequest, DispatchResult, Dispatcher, ToolInput};
use crate::error::{Error, Result};
use crate::protocol::{Action, MessageKind};

/// A tool an agent framework can call with free-form input.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the structured input.
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Sends and receives enveloped messages on named queues.
///
/// The dispatcher identity doubles as the tool name, the envelope sender
/// and the default queue.
#[derive(Clone)]
pub struct QueueTool {
    dispatcher: Dispatcher,
    description: String,
}

impl QueueTool {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            description: "Send messages to and receive messages from other agents over named queues"
                .to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Normalize and dispatch one input. Returns the received content, or
    /// `None` for a send.
    pub async fn run(&self, input: impl Into<ToolInput>) -> Result<Option<String>> {
        let request = normalize(input.into(), self.dispatcher.identity())?;
        Ok(self.dispatcher.dispatch(request).await?.into_content())
    }

    /// Send `content` to `receiver`'s queue wrapped as a `kind` envelope.
    pub async fn send_message(
        &self,
        receiver: &str,
        content: &str,
        kind: MessageKind,
        priority: u8,
    ) -> Result<()> {
        let request = ActionRequest::send(receiver, content)
            .with_kind(kind)
            .with_priority(priority);
        self.dispatcher.dispatch(request).await?;
        Ok(())
    }

    /// Fetch one message from `queue_name` and return its content.
    pub async fn receive_message(&self, queue_name: &str) -> Result<String> {
        match self
            .dispatcher
            .dispatch(ActionRequest::receive(queue_name))
            .await?
        {
            DispatchResult::Received(envelope) => Ok(envelope.into_content()),
            DispatchResult::Sent => Err(Error::BrokerUnavailable {
                operation: Action::Receive,
                queue: queue_name.to_string(),
                reason: "no message delivered".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Tool for QueueTool {
    fn name(&self) -> &str {
        self.dispatcher.identity()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [Action::Send.token(), Action::Receive.token()]
                },
                "queue_name": {
                    "type": "string",
                    "description": "Target queue; defaults to this agent's own queue"
                },
                "message": {
                    "type": "string",
                    "description": "Content to send (send_message only)"
                },
                "type": { "type": "string", "default": "text" },
                "persistent": { "type": "boolean", "default": false },
                "priority": { "type": "integer", "minimum": 0, "maximum": 255, "default": 0 }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input = ToolInput::from_value(input)?;
        Ok(match self.run(input).await? {
            Some(content) => Value::String(content),
            None => Value::Null,
        })
    }
}
