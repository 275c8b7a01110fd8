//! hedera-agent - ask questions about the Hedera ledger in plain language

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask_command, init_command, ops_command, status_command};

/// hedera-agent - Hedera ledger assistant for your terminal
#[derive(Parser)]
#[command(name = "hedera-agent")]
#[command(about = "◆ Natural-language queries over the Hedera ledger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config
    Init,
    /// Ask the agent (interactive when no message is given)
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the operations the agent can call
    Ops,
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logs go to stderr, answers to stdout
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Ask { message } => ask_command(message).await,
        Commands::Ops => ops_command().await,
        Commands::Status => status_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
