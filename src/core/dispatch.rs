//! Action dispatch: one canonical request, one channel, one result.
//!
//! Per call the dispatcher walks
//! `Idle -> ConfigResolved -> ChannelOpen -> Completed | Failed -> Closed`.
//! `Closed` is reached on every path, including a panicking channel.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::broker::{BrokerChannel, ChannelError, ChannelFactory, ChannelOutcome, ChannelRequest};
use crate::config::ConfigSource;
use crate::error::{Error, Result};
use crate::protocol::envelope::{self, Envelope};
use crate::protocol::Action;

use super::request::ActionRequest;

/// Lifecycle states of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    ConfigResolved,
    ChannelOpen,
    Completed,
    Failed,
    Closed,
}

/// Records the states one dispatch passed through.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    states: Vec<DispatchState>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            states: vec![DispatchState::Idle],
        }
    }

    fn advance(&mut self, next: DispatchState) {
        tracing::debug!(from = ?self.current(), to = ?next, "dispatch state");
        self.states.push(next);
    }

    pub fn current(&self) -> DispatchState {
        self.states.last().copied().unwrap_or(DispatchState::Idle)
    }

    pub fn states(&self) -> &[DispatchState] {
        &self.states
    }
}

/// Successful dispatch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Sent,
    Received(Envelope),
}

impl DispatchResult {
    /// Received content, `None` for sends.
    pub fn content(&self) -> Option<&str> {
        match self {
            DispatchResult::Sent => None,
            DispatchResult::Received(envelope) => Some(&envelope.content),
        }
    }

    pub fn into_content(self) -> Option<String> {
        match self {
            DispatchResult::Sent => None,
            DispatchResult::Received(envelope) => Some(envelope.into_content()),
        }
    }
}

/// Dispatches canonical requests for one agent identity.
///
/// Holds no per-call state; concurrent dispatches share nothing but the
/// read-only config source and channel factory.
#[derive(Clone)]
pub struct Dispatcher {
    identity: String,
    config: ConfigSource,
    factory: Arc<dyn ChannelFactory>,
}

impl Dispatcher {
    pub fn new(
        identity: impl Into<String>,
        config: ConfigSource,
        factory: Arc<dyn ChannelFactory>,
    ) -> Result<Self> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(Error::Config("agent identity must not be empty".to_string()));
        }
        Ok(Self {
            identity,
            config,
            factory,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub async fn dispatch(&self, request: ActionRequest) -> Result<DispatchResult> {
        self.dispatch_traced(request).await.0
    }

    /// Dispatch and return the lifecycle the call went through.
    pub async fn dispatch_traced(&self, request: ActionRequest) -> (Result<DispatchResult>, Lifecycle) {
        let mut lifecycle = Lifecycle::new();
        let result = self.run(&request, &mut lifecycle).await;

        if lifecycle.current() != DispatchState::Closed {
            // Failed before a channel existed; nothing to release.
            lifecycle.advance(DispatchState::Failed);
            lifecycle.advance(DispatchState::Closed);
        }

        match &result {
            Ok(_) => tracing::info!(
                action = %request.action,
                queue = %request.queue_name,
                "dispatch completed"
            ),
            Err(e) => tracing::warn!(
                action = %request.action,
                queue = %request.queue_name,
                code = e.code(),
                "dispatch failed: {}",
                e
            ),
        }

        (result, lifecycle)
    }

    async fn run(&self, request: &ActionRequest, lifecycle: &mut Lifecycle) -> Result<DispatchResult> {
        request.validate()?;

        let config = self.config.resolve()?;
        lifecycle.advance(DispatchState::ConfigResolved);

        let payload = match request.action {
            Action::Send => Some(self.wire_payload(request)?),
            Action::Receive => None,
        };

        let channel_request = ChannelRequest {
            action: request.action,
            queue_name: request.queue_name.clone(),
            payload,
            persistent: request.persistent,
            priority: request.priority,
        };

        let mut channel = self
            .factory
            .open(&config, channel_request)
            .map_err(|e| self.broker_failure(request, e))?;
        lifecycle.advance(DispatchState::ChannelOpen);

        let outcome = run_guarded(channel.as_mut()).await;
        let result = self.finish(request, outcome);
        lifecycle.advance(match result {
            Ok(_) => DispatchState::Completed,
            Err(_) => DispatchState::Failed,
        });

        if let Err(e) = channel.close().await {
            tracing::warn!(
                action = %request.action,
                queue = %request.queue_name,
                "channel close failed: {}",
                e
            );
        }
        lifecycle.advance(DispatchState::Closed);

        result
    }

    /// Final bytes for a send: relayed envelopes go out verbatim, raw
    /// content gets wrapped.
    fn wire_payload(&self, request: &ActionRequest) -> Result<String> {
        let payload = request
            .payload
            .as_deref()
            .ok_or_else(|| Error::malformed("send_message requires a message"))?;

        if let Some(relayed) = envelope::sniff(payload) {
            if relayed.is_for(&request.queue_name) {
                tracing::debug!(
                    sender = %relayed.sender,
                    queue = %request.queue_name,
                    "relaying envelope verbatim"
                );
                return Ok(payload.to_string());
            }
        }

        envelope::encode(&self.identity, &request.queue_name, &request.kind, payload)
    }

    fn finish(
        &self,
        request: &ActionRequest,
        outcome: std::result::Result<ChannelOutcome, ChannelError>,
    ) -> Result<DispatchResult> {
        match (request.action, outcome) {
            (_, Err(e)) => Err(self.broker_failure(request, e)),
            (Action::Send, Ok(_)) => Ok(DispatchResult::Sent),
            (Action::Receive, Ok(ChannelOutcome::Delivered(body))) => {
                let envelope = decode_delivery(body).map_err(|e| {
                    tracing::error!(
                        action = %request.action,
                        queue = %request.queue_name,
                        "received message is not an envelope: {}",
                        e
                    );
                    e
                })?;
                Ok(DispatchResult::Received(envelope))
            }
            (Action::Receive, Ok(ChannelOutcome::Published)) => Err(self.broker_failure(
                request,
                ChannelError::Other("channel returned no delivery".to_string()),
            )),
        }
    }

    fn broker_failure(&self, request: &ActionRequest, e: ChannelError) -> Error {
        tracing::error!(
            action = %request.action,
            queue = %request.queue_name,
            backend = self.factory.name(),
            "broker operation failed: {}",
            e
        );
        Error::BrokerUnavailable {
            operation: request.action,
            queue: request.queue_name.clone(),
            reason: e.to_string(),
        }
    }
}

/// Decode a raw delivery body. A body that is not UTF-8 is a malformed
/// envelope, not a broker failure.
fn decode_delivery(body: Vec<u8>) -> Result<Envelope> {
    let wire = String::from_utf8(body)
        .map_err(|e| Error::envelope(format!("delivery is not UTF-8: {}", e)))?;
    envelope::decode(&wire)
}

/// Run the channel, turning a panic into a channel error so teardown
/// still happens.
async fn run_guarded(channel: &mut dyn BrokerChannel) -> std::result::Result<ChannelOutcome, ChannelError> {
    match AssertUnwindSafe(channel.run()).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(ChannelError::Other("channel panicked during run".to_string())),
    }
}
