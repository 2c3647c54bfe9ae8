//! CLI commands for agentmq using clap.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::broker::{AmqpChannelFactory, AmqpOptions};
use crate::config::{load_settings, load_settings_from, ConfigSource, ConnectionOverrides, Settings};
use crate::core::{ActionRequest, Dispatcher};
use crate::protocol::MessageKind;
use crate::tool::{QueueTool, Tool};

/// agentmq - envelope messaging between agents over RabbitMQ queues.
#[derive(Parser, Debug)]
#[command(name = "agentmq")]
#[command(version)]
#[command(about = "Send and receive agent messages over RabbitMQ queues", long_about = None)]
pub struct Commands {
    /// Agent identity (sender name and default queue)
    #[arg(long, short = 'n', global = true, env = "AGENTMQ_NAME")]
    pub name: Option<String>,

    /// Settings file (default: ~/.agentmq/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Receive timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log debug output to the console
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Explicit broker connection values.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Broker host
    #[arg(long, global = true)]
    pub host: Option<String>,

    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[arg(long, global = true)]
    pub vhost: Option<String>,

    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    fn to_overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            vhost: self.vhost.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a message to a queue
    Send {
        /// Target queue
        queue: String,

        /// Message content
        message: String,

        /// Envelope type
        #[arg(long, default_value = "text")]
        kind: String,

        #[arg(long, default_value_t = 0)]
        priority: u8,

        /// Ask the broker to persist the message
        #[arg(long)]
        persistent: bool,
    },

    /// Receive one message from a queue (default: own queue)
    Receive {
        queue: Option<String>,
    },

    /// Call the tool entry point with raw input (free text or JSON parameters)
    Tool {
        input: String,
    },

    /// Show the resolved connection configuration
    Config,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = match &self.settings {
            Some(path) => load_settings_from(path)?,
            None => load_settings()?,
        };
        let source = self.config_source(&settings);

        match &self.command {
            Command::Config => cmd_config(&source),
            Command::Send {
                queue,
                message,
                kind,
                priority,
                persistent,
            } => {
                let tool = self.build_tool(&settings, source)?;
                cmd_send(&tool, queue, message, kind, *priority, *persistent).await
            }
            Command::Receive { queue } => {
                let tool = self.build_tool(&settings, source)?;
                cmd_receive(&tool, queue.as_deref()).await
            }
            Command::Tool { input } => {
                let tool = self.build_tool(&settings, source)?;
                cmd_tool(&tool, input).await
            }
        }
    }

    fn config_source(&self, settings: &Settings) -> ConfigSource {
        let overrides = settings.broker.clone().merge(self.connection.to_overrides());
        ConfigSource::new(overrides).with_env_prefix(settings.env_prefix.clone())
    }

    fn build_tool(&self, settings: &Settings, source: ConfigSource) -> Result<QueueTool> {
        let identity = self
            .name
            .clone()
            .or_else(|| settings.identity.clone())
            .ok_or_else(|| anyhow!("No agent identity: pass --name or set \"identity\" in settings"))?;

        let options = AmqpOptions {
            receive_timeout: Duration::from_secs(
                self.timeout.unwrap_or(settings.receive_timeout_secs),
            ),
            ..Default::default()
        };
        let factory = Arc::new(AmqpChannelFactory::new(options));

        Ok(QueueTool::new(Dispatcher::new(identity, source, factory)?))
    }
}

// Command implementations

fn cmd_config(source: &ConfigSource) -> Result<()> {
    let config = source.resolve()?;
    println!("Connection:");
    println!("  Host:     {}", config.host);
    println!("  Port:     {}", config.port);
    println!("  Vhost:    {}", config.vhost);
    println!("  Username: {}", config.username);
    println!("  Password: ***");
    println!("  URI:      {}", config.redacted_uri());
    Ok(())
}

async fn cmd_send(
    tool: &QueueTool,
    queue: &str,
    message: &str,
    kind: &str,
    priority: u8,
    persistent: bool,
) -> Result<()> {
    let request = ActionRequest::send(queue, message)
        .with_kind(MessageKind::from(kind))
        .with_priority(priority)
        .with_persistent(persistent);
    tool.dispatcher().dispatch(request).await?;
    println!("Sent to {}", queue);
    Ok(())
}

async fn cmd_receive(tool: &QueueTool, queue: Option<&str>) -> Result<()> {
    let queue = queue.unwrap_or_else(|| tool.name());
    let content = tool.receive_message(queue).await?;
    println!("{}", content);
    Ok(())
}

async fn cmd_tool(tool: &QueueTool, input: &str) -> Result<()> {
    match tool.execute(Value::String(input.to_string())).await? {
        Value::String(content) => println!("{}", content),
        Value::Null => println!("OK"),
        other => println!("{}", other),
    }
    Ok(())
}
