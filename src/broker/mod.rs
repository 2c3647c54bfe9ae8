//! Broker channel seam.
//!
//! A channel owns the connection lifetime of exactly one operation: one
//! publish, or one fetch-and-ack. The dispatcher opens it, runs it once and
//! closes it on every exit path.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConnectionConfig;
use crate::protocol::Action;

pub mod amqp;
pub mod memory;

pub use amqp::{AmqpChannelFactory, AmqpOptions};
pub use memory::MemoryBroker;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("No message within {0:?}")]
    Timeout(Duration),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("{0}")]
    Other(String),
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Parameters a channel is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub action: Action,
    pub queue_name: String,
    /// Final wire payload, present for sends only.
    pub payload: Option<String>,
    pub persistent: bool,
    pub priority: u8,
}

/// What a channel produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Published,
    /// Raw delivery body; decoding is the dispatcher's job.
    Delivered(Vec<u8>),
}

/// One broker operation's connection lifetime.
#[async_trait]
pub trait BrokerChannel: Send {
    /// Perform the single operation this channel was opened for.
    async fn run(&mut self) -> ChannelResult<ChannelOutcome>;

    /// Release the channel and its connection. Must be safe to call after a
    /// failed or panicked `run`, and more than once.
    async fn close(&mut self) -> ChannelResult<()>;
}

/// Builds channels. Construction performs no I/O.
pub trait ChannelFactory: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    fn open(
        &self,
        config: &ConnectionConfig,
        request: ChannelRequest,
    ) -> ChannelResult<Box<dyn BrokerChannel>>;
}
