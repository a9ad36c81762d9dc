//! confab - chat with a local model that can call namespaced tools

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{chat_command, history_command, init_command, status_command, threads_command};

/// confab - terminal chat with tools
#[derive(Parser)]
#[command(name = "confab")]
#[command(about = "Terminal chat with a local model and namespaced tools")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and workspace
    Init,
    /// Chat with the model
    Chat {
        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Thread to continue; a new one is started when omitted
        #[arg(short, long)]
        thread: Option<String>,
        /// Debug logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show config and tool catalog status
    Status,
    /// Print the messages of a thread
    History {
        #[arg(short, long)]
        thread: String,
    },
    /// List saved threads
    Threads,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(matches!(cli.command, Commands::Chat { verbose: true, .. }));

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Chat {
            message, thread, ..
        } => chat_command(message, thread).await,
        Commands::Status => status_command().await,
        Commands::History { thread } => history_command(thread).await,
        Commands::Threads => threads_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
