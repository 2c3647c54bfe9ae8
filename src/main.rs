//! agentmq - envelope messaging between agents over RabbitMQ queues.

use clap::Parser;
use std::process::ExitCode;

use agentmq::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Commands::parse();

    // Initialize logging; the guard flushes the log file on exit
    let _guard = match logging::init(args.verbose) {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the command
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            match e.downcast_ref::<agentmq::Error>() {
                Some(err) => eprintln!("Error [{}]: {}", err.code(), err),
                None => eprintln!("Error: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}
