//! agentmq library root.
//!
//! Agents exchange enveloped messages over named broker queues through a
//! single tool entry point that accepts free text or parameter maps.

pub mod broker;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod tool;

pub use broker::{AmqpChannelFactory, BrokerChannel, ChannelFactory, MemoryBroker};
pub use cli::Commands;
pub use config::{load_settings, ConfigSource, ConnectionConfig, ConnectionOverrides, Settings};
pub use crate::core::{normalize, ActionRequest, DispatchResult, Dispatcher, ToolInput};
pub use error::{Error, Result};
pub use protocol::{Action, Envelope, MessageKind};
pub use tool::{QueueTool, Tool};
